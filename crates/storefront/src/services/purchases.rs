//! Checkout and purchase history.
//!
//! Checkout turns the buyer's cart into an immutable purchase inside one
//! `SERIALIZABLE` transaction. The cart lines are re-read and re-checked in
//! the transaction; if `PostgreSQL` aborts it because a concurrent buyer
//! touched the same rows, the whole attempt is re-run by
//! [`retry_on_conflict`](super::retry::retry_on_conflict).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use waladaw_core::{DomainError, DomainResult, Price, ProductId, PurchaseId, UserId};

use super::cache::CatalogCache;
use super::cart::ensure_buyable;
use super::email::EmailService;
use super::retry::{RetryPolicy, retry_on_conflict};
use crate::db::{PurchaseRepository, RepositoryError, UserRepository, cart, purchases};
use crate::models::cart::CartLine;
use crate::models::purchase::{Purchase, PurchaseDetail, PurchaseLine, SaleLine};
use crate::models::session::CurrentUser;
use crate::state::AppState;

/// Longest accepted shipping address.
pub const MAX_ADDRESS_LENGTH: usize = 500;

/// What a checkout attempt will write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutPlan {
    pub lines: Vec<PlannedLine>,
    pub total: Price,
}

/// One product to be sold, with its price frozen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLine {
    pub product_id: ProductId,
    pub seller_id: UserId,
    pub product_name: String,
    pub price: Price,
}

/// Decide whether `buyer` can pay for `lines` at `now`.
///
/// A buyer's own lapsed reservation is fine as long as nobody else has
/// reserved the product since.
///
/// # Errors
///
/// Returns `BusinessRule` for an empty cart or for the first product that is
/// sold, deleted, the buyer's own, or reserved by someone else.
pub fn plan_checkout(
    buyer: UserId,
    lines: &[CartLine],
    now: DateTime<Utc>,
) -> DomainResult<CheckoutPlan> {
    if lines.is_empty() {
        return Err(DomainError::rule("Your cart is empty"));
    }

    let mut planned = Vec::with_capacity(lines.len());
    for line in lines {
        ensure_buyable(
            &line.product_name,
            line.hold().availability_for(Some(buyer), now),
        )?;
        planned.push(PlannedLine {
            product_id: line.product_id,
            seller_id: line.seller_id,
            product_name: line.product_name.clone(),
            price: line.price,
        });
    }

    let total = planned.iter().map(|line| line.price).sum();
    Ok(CheckoutPlan {
        lines: planned,
        total,
    })
}

/// Normalize and validate a shipping address.
///
/// # Errors
///
/// Returns `BusinessRule` when empty or longer than [`MAX_ADDRESS_LENGTH`].
pub fn validate_address(raw: &str) -> DomainResult<String> {
    let address = raw.trim().replace("\r\n", "\n");
    if address.is_empty() {
        return Err(DomainError::rule("A shipping address is required"));
    }
    if address.chars().count() > MAX_ADDRESS_LENGTH {
        return Err(DomainError::rule(format!(
            "The shipping address must be at most {MAX_ADDRESS_LENGTH} characters"
        )));
    }
    Ok(address)
}

/// Purchases for buyers, sellers and admins.
pub struct PurchaseService<'a> {
    pool: &'a PgPool,
    cache: &'a CatalogCache,
    email: &'a EmailService,
    retry: RetryPolicy,
}

impl<'a> PurchaseService<'a> {
    #[must_use]
    pub fn new(state: &'a AppState) -> Self {
        Self {
            pool: state.pool(),
            cache: state.cache(),
            email: state.email(),
            retry: RetryPolicy::checkout(state.config().market.checkout_max_attempts),
        }
    }

    /// Buy everything in the cart.
    ///
    /// # Errors
    ///
    /// Returns `BusinessRule` for an empty cart, a bad address or an
    /// unavailable product, and `Conflict` when concurrent checkouts kept
    /// aborting the transaction.
    #[tracing::instrument(skip(self, shipping_address), fields(buyer_id = %buyer))]
    pub async fn checkout(&self, buyer: UserId, shipping_address: &str) -> DomainResult<PurchaseId> {
        let address = validate_address(shipping_address)?;

        let (purchase_id, product_ids) = retry_on_conflict(self.retry, |attempt| {
            self.try_checkout(buyer, &address, attempt)
        })
        .await?;

        tracing::info!(%purchase_id, items = product_ids.len(), "purchase completed");

        self.cache.invalidate_products(&product_ids).await;
        self.notify(purchase_id).await;

        Ok(purchase_id)
    }

    async fn try_checkout(
        &self,
        buyer: UserId,
        address: &str,
        attempt: u32,
    ) -> DomainResult<(PurchaseId, Vec<ProductId>)> {
        tracing::debug!(attempt, "checkout attempt");
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;

        let lines = cart::list_for_checkout(&mut tx, buyer).await?;
        let plan = plan_checkout(buyer, &lines, Utc::now())?;

        let purchase_id = purchases::insert_purchase(&mut tx, buyer, plan.total, address).await?;
        for line in &plan.lines {
            purchases::insert_line(
                &mut tx,
                purchase_id,
                line.product_id,
                line.seller_id,
                &line.product_name,
                line.price,
            )
            .await?;
        }
        cart::clear(&mut tx, buyer).await?;

        tx.commit().await.map_err(RepositoryError::from)?;

        Ok((
            purchase_id,
            plan.lines.iter().map(|line| line.product_id).collect(),
        ))
    }

    /// Confirmation to the buyer and a notice to each seller. Never fails.
    async fn notify(&self, purchase_id: PurchaseId) {
        let detail = match PurchaseRepository::new(self.pool).get(purchase_id).await {
            Ok(Some(detail)) => detail,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, %purchase_id, "could not load purchase for email");
                return;
            }
        };

        self.email
            .send_best_effort(self.email.purchase_confirmation(&detail))
            .await;

        let users = UserRepository::new(self.pool);
        for (seller_id, lines) in lines_by_seller(&detail.lines) {
            match users.get_by_id(seller_id).await {
                Ok(Some(seller)) => {
                    self.email
                        .send_best_effort(self.email.sale_notice(
                            seller.email.as_str(),
                            &seller.display_name,
                            &detail,
                            &lines,
                        ))
                        .await;
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, %seller_id, "could not load seller for email"),
            }
        }
    }

    /// The buyer's purchases.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Technical` if the query fails.
    pub async fn list_for_buyer(&self, buyer: UserId) -> DomainResult<Vec<Purchase>> {
        Ok(PurchaseRepository::new(self.pool).list_for_buyer(buyer).await?)
    }

    /// A purchase visible to its buyer, the sellers of its lines, and admins.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown purchases and `Forbidden` for other users.
    pub async fn get_for_user(
        &self,
        user: &CurrentUser,
        id: PurchaseId,
    ) -> DomainResult<PurchaseDetail> {
        let detail = PurchaseRepository::new(self.pool)
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Purchase"))?;
        ensure_can_view(user, &detail)?;
        Ok(detail)
    }

    /// The purchase rendered as a PDF invoice.
    ///
    /// # Errors
    ///
    /// Same as [`PurchaseService::get_for_user`], plus rendering failures.
    pub async fn invoice_pdf(
        &self,
        user: &CurrentUser,
        id: PurchaseId,
    ) -> DomainResult<(String, Vec<u8>)> {
        let detail = self.get_for_user(user, id).await?;
        let bytes = super::invoice::InvoiceService::render(&detail)?;
        Ok((super::invoice::InvoiceService::file_name(&detail), bytes))
    }

    /// Items the seller has sold.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Technical` if the query fails.
    pub async fn list_sales(&self, seller: UserId) -> DomainResult<Vec<SaleLine>> {
        Ok(PurchaseRepository::new(self.pool).list_sales(seller).await?)
    }

    /// Latest purchases across the marketplace, for the admin dashboard.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Technical` if the query fails.
    pub async fn latest(&self, limit: i64) -> DomainResult<Vec<Purchase>> {
        Ok(PurchaseRepository::new(self.pool).latest(limit).await?)
    }
}

/// Buyer, sellers of any line, and admins may see a purchase.
///
/// # Errors
///
/// Returns `DomainError::Forbidden` for everyone else.
pub fn ensure_can_view(user: &CurrentUser, detail: &PurchaseDetail) -> DomainResult<()> {
    if user.is_admin() || detail.purchase.buyer_id == user.id || detail.involves_seller(user.id) {
        Ok(())
    } else {
        Err(DomainError::forbidden(format!(
            "user {} may not view purchase {}",
            user.id, detail.purchase.id
        )))
    }
}

fn lines_by_seller(lines: &[PurchaseLine]) -> BTreeMap<UserId, Vec<&PurchaseLine>> {
    let mut grouped: BTreeMap<UserId, Vec<&PurchaseLine>> = BTreeMap::new();
    for line in lines {
        grouped.entry(line.seller_id).or_default().push(line);
    }
    grouped
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use rust_decimal::Decimal;
    use waladaw_core::{Email, PurchaseId, PurchaseLineId, UserRole};

    use super::*;
    use crate::models::cart::tests::line;

    const BUYER: UserId = UserId::new(2);

    #[test]
    fn test_plan_sums_lines() {
        let now = Utc::now();
        let plan = plan_checkout(BUYER, &[line(1, "10.10", now), line(2, "4.90", now)], now).unwrap();
        assert_eq!(plan.lines.len(), 2);
        assert_eq!(plan.total.amount(), Decimal::new(1500, 2));
        assert_eq!(plan.lines[0].product_name, "Item 1");
    }

    #[test]
    fn test_plan_rejects_empty_cart() {
        assert_eq!(
            plan_checkout(BUYER, &[], Utc::now()),
            Err(DomainError::rule("Your cart is empty"))
        );
    }

    #[test]
    fn test_plan_rejects_sold_product() {
        let now = Utc::now();
        let mut sold = line(2, "5", now);
        sold.purchase_id = Some(PurchaseId::new(1));
        let err = plan_checkout(BUYER, &[line(1, "5", now), sold], now).unwrap_err();
        assert_eq!(err, DomainError::rule("\"Item 2\" has already been sold"));
    }

    #[test]
    fn test_plan_rejects_product_reserved_by_other() {
        let now = Utc::now();
        let mut taken = line(1, "5", now);
        taken.reserved_by = Some(UserId::new(3));
        let err = plan_checkout(BUYER, &[taken], now).unwrap_err();
        assert_eq!(
            err,
            DomainError::rule("\"Item 1\" is reserved by another buyer")
        );
    }

    #[test]
    fn test_plan_accepts_own_expired_reservation() {
        let now = Utc::now();
        let mut lapsed = line(1, "5", now);
        lapsed.reserved_until = Some(now - Duration::minutes(1));
        lapsed.expires_at = now - Duration::minutes(1);
        assert!(plan_checkout(BUYER, &[lapsed], now).is_ok());
    }

    #[test]
    fn test_plan_accepts_others_expired_reservation() {
        let now = Utc::now();
        let mut lapsed = line(1, "5", now);
        lapsed.reserved_by = Some(UserId::new(3));
        lapsed.reserved_until = Some(now - Duration::seconds(1));
        assert!(plan_checkout(BUYER, &[lapsed], now).is_ok());
    }

    #[test]
    fn test_plan_rejects_deleted_and_own_products() {
        let now = Utc::now();
        let mut deleted = line(1, "5", now);
        deleted.deleted_at = Some(now);
        assert!(plan_checkout(BUYER, &[deleted], now).is_err());

        let mut own = line(2, "5", now);
        own.seller_id = BUYER;
        assert_eq!(
            plan_checkout(BUYER, &[own], now),
            Err(DomainError::rule("\"Item 2\" is your own listing"))
        );
    }

    #[test]
    fn test_validate_address() {
        assert_eq!(
            validate_address("  Calle Luna 4\r\nMadrid ").unwrap(),
            "Calle Luna 4\nMadrid"
        );
        assert!(validate_address("   ").is_err());
        assert!(validate_address(&"a".repeat(MAX_ADDRESS_LENGTH + 1)).is_err());
    }

    fn detail() -> PurchaseDetail {
        let purchase_line = |id: i32, seller: i32| PurchaseLine {
            id: PurchaseLineId::new(id),
            purchase_id: PurchaseId::new(1),
            product_id: ProductId::new(id),
            seller_id: UserId::new(seller),
            seller_name: String::new(),
            product_name: String::new(),
            price: Price::parse("1").unwrap(),
        };
        PurchaseDetail {
            purchase: Purchase {
                id: PurchaseId::new(1),
                buyer_id: BUYER,
                buyer_name: "Buyer".to_owned(),
                buyer_email: Email::parse("buyer@correo.es").unwrap(),
                total: Price::parse("3").unwrap(),
                shipping_address: "Somewhere".to_owned(),
                created_at: Utc::now(),
            },
            lines: vec![purchase_line(1, 5), purchase_line(2, 6), purchase_line(3, 5)],
        }
    }

    fn viewer(id: i32, role: UserRole) -> CurrentUser {
        CurrentUser {
            id: UserId::new(id),
            email: Email::parse("viewer@correo.es").unwrap(),
            display_name: "Viewer".to_owned(),
            role,
        }
    }

    #[test]
    fn test_purchase_visibility() {
        let detail = detail();
        assert!(ensure_can_view(&viewer(2, UserRole::User), &detail).is_ok());
        assert!(ensure_can_view(&viewer(6, UserRole::User), &detail).is_ok());
        assert!(ensure_can_view(&viewer(50, UserRole::Admin), &detail).is_ok());
        assert!(matches!(
            ensure_can_view(&viewer(7, UserRole::User), &detail),
            Err(DomainError::Forbidden(_))
        ));
    }

    #[test]
    fn test_lines_by_seller() {
        let detail = detail();
        let grouped = lines_by_seller(&detail.lines);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[&UserId::new(5)].len(), 2);
        assert_eq!(grouped[&UserId::new(6)].len(), 1);
    }
}
