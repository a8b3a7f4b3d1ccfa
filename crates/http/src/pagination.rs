use serde::Deserialize;
use stacks_db::PageRequest;

use crate::error::AppError;

/// `?page=` query parameter of list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
}

impl PageParams {
    /// Non-integer page numbers are reported as not found, like out-of-range ones.
    pub fn request(&self) -> Result<PageRequest, AppError> {
        match self.page.as_deref() {
            None | Some("") => Ok(PageRequest::First),
            Some(raw) => raw.parse().map_err(AppError::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_page_means_first() {
        let params = PageParams::default();
        assert_eq!(params.request().unwrap(), PageRequest::First);
    }

    #[test]
    fn garbage_page_is_not_found() {
        let params = PageParams {
            page: Some("x".to_string()),
        };
        let err = params.request().unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::NOT_FOUND);
    }
}
