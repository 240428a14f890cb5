pub mod list;
pub mod notification;
pub mod share;
pub mod task;
pub mod user;

pub use list::ListRepository;
pub use notification::NotificationRepository;
pub use share::ShareRepository;
pub use task::TaskRepository;
pub use user::UserRepository;
