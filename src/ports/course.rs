use {
    crate::domain::error::ServiceError,
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    std::collections::HashMap,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseInfo {
    pub title: String,
    pub description: String,
    pub thumbnail: Option<String>,
}

/// Cross-service RPC client port (spec §6 `Course.GetCoursesByIds`), used
/// by `CreatePayment` to build provider line items (spec §4.4 step 2).
#[async_trait]
pub trait CoursePort: Send + Sync {
    async fn get_courses_by_ids(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, CourseInfo>, ServiceError>;
}
