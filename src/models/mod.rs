pub mod board;
pub mod task;
pub mod user;

pub use board::{Board, BoardInput, Member, MemberInput, Role};
pub use task::{Task, TaskInput, TaskPriority, TaskQuery, TaskStatus};
pub use user::{NewUser, User, UserListQuery, UserProfile, UserUpdate};
