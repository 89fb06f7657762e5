pub mod dates;
pub mod doc_merge;
pub mod email_cache;
pub mod email_filter;
