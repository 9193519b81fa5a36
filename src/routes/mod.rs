mod health_check;
mod lists;
mod members;

pub use health_check::health_check;
pub use lists::create_list;
pub use lists::remove_list;
pub use lists::show_list;
pub use lists::update_list;
pub use members::create_member;
pub use members::remove_member;
pub use members::show_member;
pub use members::show_members;
pub use members::update_member;
