pub mod attendance_record;
pub mod certificate;
pub mod day_keyword;
pub mod enrollment;
pub mod event;
pub mod user;

pub use attendance_record::Entity as AttendanceRecord;
pub use certificate::Entity as Certificate;
pub use day_keyword::Entity as DayKeyword;
pub use enrollment::Entity as Enrollment;
pub use event::Entity as Event;
pub use user::Entity as User;
