pub mod event_time;
pub mod seismic_record;

pub use event_time::{EventTimes, LOCAL_UTC_OFFSET_HOURS};
pub use seismic_record::SeismicRecord;
