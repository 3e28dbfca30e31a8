//! PDF invoices for purchases.
//!
//! Draws a single-column A4 document with printpdf's built-in Helvetica.
//! Built-in fonts only cover WinAnsi text, so amounts are written as `EUR`.

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};
use rust_decimal::Decimal;

use waladaw_core::DomainError;

use crate::models::purchase::PurchaseDetail;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN_LEFT: f32 = 20.0;
const PRICE_COLUMN: f32 = 165.0;
const TOP: f32 = 270.0;
const BOTTOM: f32 = 25.0;
const LINE_HEIGHT: f32 = 7.0;
const MAX_NAME_CHARS: usize = 70;

/// Renders purchase invoices.
pub struct InvoiceService;

impl InvoiceService {
    /// Render the invoice of a purchase as PDF bytes.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Technical` if the document cannot be produced.
    pub fn render(detail: &PurchaseDetail) -> Result<Vec<u8>, DomainError> {
        let purchase = &detail.purchase;
        let number = purchase.number();
        let title = format!("WalaDaw invoice {number}");

        let (doc, page, layer) =
            PdfDocument::new(&title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(pdf_error)?;

        let mut pen = Pen {
            doc: &doc,
            layer: doc.get_page(page).get_layer(layer),
            y: TOP,
        };

        pen.write(&bold, 20.0, MARGIN_LEFT, "WalaDaw");
        pen.advance(LINE_HEIGHT * 1.5);
        pen.write(&bold, 14.0, MARGIN_LEFT, &format!("Invoice {number}"));
        pen.advance(LINE_HEIGHT);
        pen.write(
            &regular,
            10.0,
            MARGIN_LEFT,
            &format!("Date: {}", purchase.created_at.format("%Y-%m-%d %H:%M UTC")),
        );
        pen.advance(LINE_HEIGHT * 2.0);

        pen.write(&bold, 11.0, MARGIN_LEFT, "Bill to");
        pen.advance(LINE_HEIGHT);
        pen.write(&regular, 10.0, MARGIN_LEFT, &winansi(&purchase.buyer_name));
        pen.advance(LINE_HEIGHT);
        pen.write(&regular, 10.0, MARGIN_LEFT, purchase.buyer_email.as_str());
        pen.advance(LINE_HEIGHT);
        for address_line in purchase.shipping_address.lines() {
            pen.write(&regular, 10.0, MARGIN_LEFT, &winansi(address_line));
            pen.advance(LINE_HEIGHT);
        }
        pen.advance(LINE_HEIGHT);

        pen.write(&bold, 11.0, MARGIN_LEFT, "Item");
        pen.write(&bold, 11.0, PRICE_COLUMN, "Price");
        pen.advance(LINE_HEIGHT);
        for line in &detail.lines {
            pen.ensure_room();
            let label = format!("{} (seller: {})", line.product_name, line.seller_name);
            pen.write(&regular, 10.0, MARGIN_LEFT, &truncate(&winansi(&label), MAX_NAME_CHARS));
            pen.write(&regular, 10.0, PRICE_COLUMN, &euros(line.price.amount()));
            pen.advance(LINE_HEIGHT);
        }

        pen.ensure_room();
        pen.advance(LINE_HEIGHT / 2.0);
        pen.write(&bold, 12.0, MARGIN_LEFT, "Total");
        pen.write(&bold, 12.0, PRICE_COLUMN, &euros(purchase.total.amount()));

        doc.save_to_bytes().map_err(pdf_error)
    }

    /// File name offered for download.
    #[must_use]
    pub fn file_name(detail: &PurchaseDetail) -> String {
        format!("waladaw-invoice-{}.pdf", detail.purchase.number())
    }
}

/// Current write position; starts a new page when the bottom margin is reached.
struct Pen<'d> {
    doc: &'d PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
}

impl Pen<'_> {
    fn write(&self, font: &IndirectFontRef, size: f32, x: f32, text: &str) {
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
    }

    fn advance(&mut self, by: f32) {
        self.y -= by;
    }

    fn ensure_room(&mut self) {
        if self.y < BOTTOM {
            let (page, layer) = self
                .doc
                .add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = TOP;
        }
    }
}

fn euros(amount: Decimal) -> String {
    format!("{amount:.2} EUR")
}

/// Replace characters the built-in fonts cannot encode.
fn winansi(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii() || ('\u{a0}'..='\u{ff}').contains(&c) { c } else { '?' })
        .collect()
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_owned();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

#[allow(clippy::needless_pass_by_value)]
fn pdf_error(e: printpdf::Error) -> DomainError {
    tracing::error!(error = ?e, "invoice rendering failed");
    DomainError::technical(format!("pdf: {e:?}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use waladaw_core::{Email, Price, ProductId, PurchaseId, PurchaseLineId, UserId};

    use super::*;
    use crate::models::purchase::{Purchase, PurchaseLine};

    fn detail(lines: usize) -> PurchaseDetail {
        PurchaseDetail {
            purchase: Purchase {
                id: PurchaseId::new(7),
                buyer_id: UserId::new(2),
                buyer_name: "Begoña".to_owned(),
                buyer_email: Email::parse("bego@correo.es").unwrap(),
                total: Price::parse("30").unwrap(),
                shipping_address: "Calle Real 3\n48001 Bilbao".to_owned(),
                created_at: Utc::now(),
            },
            lines: (1..=lines)
                .map(|i| {
                    let id = i32::try_from(i).unwrap();
                    PurchaseLine {
                        id: PurchaseLineId::new(id),
                        purchase_id: PurchaseId::new(7),
                        product_id: ProductId::new(id),
                        seller_id: UserId::new(1),
                        seller_name: "Lola".to_owned(),
                        product_name: format!("Item {i}"),
                        price: Price::parse("10").unwrap(),
                    }
                })
                .collect(),
        }
    }

    #[test]
    fn test_render_produces_pdf() {
        let bytes = InvoiceService::render(&detail(3)).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_render_many_lines_spans_pages() {
        let bytes = InvoiceService::render(&detail(80)).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            InvoiceService::file_name(&detail(1)),
            "waladaw-invoice-WD-000007.pdf"
        );
    }

    #[test]
    fn test_helpers() {
        assert_eq!(euros(Decimal::new(1999, 2)), "19.99 EUR");
        assert_eq!(winansi("Begoña €"), "Begoña ?");
        assert_eq!(truncate("abcdef", 5), "ab...");
        assert_eq!(truncate("abc", 5), "abc");
    }
}
