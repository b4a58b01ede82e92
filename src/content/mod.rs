//! Content module - post records and their metadata

mod post;

pub use post::{
    compute_read_time, format_date, is_valid_id, read_time_for, slug_base, unique_id, NewPost,
    Post, PostKind, DATE_FORMAT,
};
