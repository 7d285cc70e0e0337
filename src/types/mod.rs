pub mod chunk;
pub mod daily_record;
pub mod payload;
pub mod period;
pub mod work_unit;
