//! Seed the database with demo users and listings.
//!
//! # File format
//!
//! ```yaml
//! users:
//!   - email: ana@example.com
//!     display_name: Ana
//!     password: demo-password
//!     admin: false
//!     products:
//!       - name: Road bike
//!         description: Aluminium frame, size M
//!         price: "180.00"
//!         category: sports
//!         condition: good
//!         city: Valencia
//! ```
//!
//! The whole file is validated before anything is written. Users whose email
//! already exists are skipped together with their products, so seeding twice
//! is harmless.

use std::path::Path;

use serde::Deserialize;
use tracing::{error, info, warn};

use waladaw_core::UserRole;
use waladaw_storefront::db::ProductRepository;
use waladaw_storefront::models::ProductInput;
use waladaw_storefront::services::AuthService;
use waladaw_storefront::services::auth::{AuthError, Registration};

use super::connect;

/// Top-level YAML document.
#[derive(Debug, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

#[derive(Debug, Deserialize)]
pub struct SeedUser {
    pub email: String,
    pub display_name: String,
    pub password: String,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub products: Vec<SeedProduct>,
}

#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: String,
    pub category: String,
    pub condition: String,
    #[serde(default)]
    pub city: String,
}

impl SeedProduct {
    fn to_input(&self) -> Result<ProductInput, String> {
        ProductInput::parse(
            &self.name,
            &self.description,
            &self.price,
            &self.category,
            &self.condition,
            &self.city,
        )
        .map_err(|e| format!("{}: {}", self.name, e.user_message()))
    }
}

/// Check every product of every user, collecting all problems.
#[must_use]
pub fn validate(file: &SeedFile) -> Vec<String> {
    file.users
        .iter()
        .flat_map(|user| {
            user.products
                .iter()
                .filter_map(move |p| p.to_input().err().map(|e| format!("{}: {e}", user.email)))
        })
        .collect()
}

/// Seed users and products from `file_path`.
///
/// # Errors
///
/// Returns an error if the file is unreadable or invalid, or if a database
/// operation fails.
pub async fn run(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading seed data");
    let content = tokio::fs::read_to_string(path).await?;
    let file: SeedFile = serde_yaml::from_str(&content)?;

    let errors = validate(&file);
    if !errors.is_empty() {
        error!("Seed file validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let pool = connect().await?;
    let auth = AuthService::new(&pool);
    let products = ProductRepository::new(&pool);

    let mut users_created = 0;
    let mut products_created = 0;

    for seed in &file.users {
        let role = if seed.admin {
            UserRole::Admin
        } else {
            UserRole::User
        };
        let registration = Registration {
            email: &seed.email,
            display_name: &seed.display_name,
            password: &seed.password,
            password_confirm: &seed.password,
        };

        let user = match auth.register(&registration, role).await {
            Ok(user) => user,
            Err(AuthError::UserAlreadyExists) => {
                warn!(email = %seed.email, "user already exists, skipping");
                continue;
            }
            Err(e) => return Err(format!("{}: {e}", seed.email).into()),
        };
        users_created += 1;

        for product in &seed.products {
            let input = product.to_input()?;
            products.create(user.id, &input, None).await?;
            products_created += 1;
        }
    }

    info!("Seeding complete!");
    info!("  Users created: {users_created}");
    info!("  Products created: {products_created}");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
users:
  - email: ana@example.com
    display_name: Ana
    password: demo-password
    products:
      - name: Road bike
        price: "180.00"
        category: sports
        condition: good
        city: Valencia
  - email: admin@example.com
    display_name: Admin
    password: admin-password
    admin: true
"#;

    #[test]
    fn test_parse_sample() {
        let file: SeedFile = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(file.users.len(), 2);
        assert!(file.users[1].admin);
        assert!(file.users[1].products.is_empty());
        assert_eq!(file.users[0].products[0].description, "");
        assert!(validate(&file).is_empty());
    }

    #[test]
    fn test_validate_reports_bad_products() {
        let yaml = r#"
users:
  - email: bob@example.com
    display_name: Bob
    password: demo-password
    products:
      - name: Lamp
        price: "free"
        category: home
        condition: good
      - name: Chair
        price: "20"
        category: furniture
        condition: good
"#;
        let file: SeedFile = serde_yaml::from_str(yaml).unwrap();
        let errors = validate(&file);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with("bob@example.com: Lamp"));
        assert!(errors[1].contains("Chair"));
    }
}
