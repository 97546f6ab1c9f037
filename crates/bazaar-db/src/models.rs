/// Database row types. These map directly to SQLite rows and stay
/// independent of the GraphQL object types built on top of them.
use bazaar_types::models::SubscriptionStatus;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub whatsapp_number: Option<String>,
    pub is_subscribed: bool,
    /// Unix seconds.
    pub subscription_end: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProjectRow {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub public_code: i64,
    pub media_url: Option<String>,
    pub category: Option<String>,
    pub place: Option<String>,
    pub price: Option<f64>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub media_url: Option<String>,
    pub category: Option<String>,
    pub place: Option<String>,
    pub price: Option<f64>,
}

/// Listing filter. Every field is optional; absent fields do not constrain.
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    pub category: Option<String>,
    pub place: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct SubscriptionRow {
    pub id: String,
    pub user_id: String,
    pub receipt_url: String,
    pub status: SubscriptionStatus,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct ReviewRow {
    pub id: String,
    pub user_id: String,
    pub project_id: Option<String>,
    pub target_user_id: Option<String>,
    pub rating: i64,
    pub comment: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub user_id: String,
    pub project_id: Option<String>,
    pub target_user_id: Option<String>,
    pub rating: i64,
    pub comment: Option<String>,
}
