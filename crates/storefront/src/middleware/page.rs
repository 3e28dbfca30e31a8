//! Per-page layout context.
//!
//! Every HTML template renders the header (user menu, cart badge) and the
//! pending flash message. [`Page`] gathers those once per request.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use super::auth::{resolve_user, take_flash};
use crate::db::CartRepository;
use crate::models::{CurrentUser, FlashMessage};
use crate::state::AppState;

/// Layout data shared by all HTML pages.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub user: Option<CurrentUser>,
    pub flash: Option<FlashMessage>,
    pub cart_count: i64,
    /// Request path, used to highlight the active nav entry.
    pub path: String,
}

impl Page {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(CurrentUser::is_admin)
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        self.user.as_ref().map_or("", |u| u.display_name.as_str())
    }

    /// Whether the nav entry for `prefix` should be highlighted.
    #[must_use]
    pub fn is_active(&self, prefix: &str) -> bool {
        if prefix == "/" {
            self.path == "/"
        } else {
            self.path.starts_with(prefix)
        }
    }
}

impl FromRequestParts<AppState> for Page {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let path = parts.uri.path().to_owned();
        let Some(session) = parts.extensions.get::<Session>().cloned() else {
            return Ok(Self {
                path,
                ..Self::default()
            });
        };

        let user = resolve_user(parts, state).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load session user");
            None
        });
        let flash = take_flash(&session).await;

        let cart_count = match &user {
            Some(user) => CartRepository::new(state.pool())
                .count(user.id)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "failed to count cart items");
                    0
                }),
            None => 0,
        };

        Ok(Self {
            user,
            flash,
            cart_count,
            path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_active() {
        let page = Page {
            path: "/products/4".to_owned(),
            ..Page::default()
        };
        assert!(page.is_active("/products"));
        assert!(!page.is_active("/"));
        assert!(!page.is_active("/cart"));
        assert!(!page.is_admin());
        assert_eq!(page.display_name(), "");
    }
}
