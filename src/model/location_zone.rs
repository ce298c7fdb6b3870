use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Named circular zone used to validate office check-ins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LocationZone {
    pub id: u64,
    #[schema(example = "Head office")]
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    #[schema(example = 150.0)]
    pub radius_m: f64,
}
