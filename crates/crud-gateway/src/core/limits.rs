use super::types::Pagination;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_page_size: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_page_size: 1000,
        }
    }
}

impl Limits {
    pub fn check_page(&self, page: &Pagination) -> AppResult<()> {
        if page.page_size > self.max_page_size {
            return Err(AppError::validation(format!(
                "page_size {} exceeds the maximum of {}",
                page.page_size, self.max_page_size
            )));
        }
        Ok(())
    }
}
