pub mod de;
pub mod time;
