mod live;
mod summary;

pub use live::LiveLog;
pub use summary::write_summary_json;
