use {
    crate::domain::error::ServiceError,
    crate::infra::retry::with_retry,
    crate::ports::course::{CourseInfo, CoursePort},
    async_trait::async_trait,
    std::collections::HashMap,
    std::time::Duration,
};

const DEADLINE: Duration = Duration::from_secs(10);
const ATTEMPTS: u32 = 3;

pub struct HttpCourseClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpCourseClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl CoursePort for HttpCourseClient {
    async fn get_courses_by_ids(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, CourseInfo>, ServiceError> {
        with_retry(ATTEMPTS, DEADLINE, || async {
            self.http
                .get(format!("{}/courses", self.base_url))
                .query(&[("ids", ids.join(","))])
                .send()
                .await
                .map_err(|e| ServiceError::Timeout(format!("course lookup: {e}")))?
                .error_for_status()
                .map_err(|e| ServiceError::Timeout(format!("course lookup: {e}")))?
                .json::<HashMap<String, CourseInfo>>()
                .await
                .map_err(|e| ServiceError::InternalUnknown(format!("course decode: {e}")))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    #[tokio::test]
    async fn fetches_and_decodes_courses_keyed_by_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/courses"))
            .and(query_param("ids", "course-1,course-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "course-1": { "title": "Rust Basics", "description": "Intro", "thumbnail": null },
                "course-2": { "title": "Async Rust", "description": "Advanced", "thumbnail": "https://img/course-2.png" },
            })))
            .mount(&server)
            .await;

        let client = HttpCourseClient::new(server.uri());
        let courses = client
            .get_courses_by_ids(&["course-1".to_string(), "course-2".to_string()])
            .await
            .unwrap();

        assert_eq!(courses.len(), 2);
        assert_eq!(courses["course-1"].title, "Rust Basics");
        assert_eq!(courses["course-2"].thumbnail.as_deref(), Some("https://img/course-2.png"));
    }

    #[tokio::test(start_paused = true)]
    async fn upstream_failure_surfaces_as_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/courses"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = HttpCourseClient::new(server.uri());
        let err = client
            .get_courses_by_ids(&["course-1".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Timeout(_)));
    }
}
