//! Typed records exchanged with the API.
//!
//! Records keep members this client does not model in a flattened `extra`
//! map, so editing a cached record through its type never drops data.

mod group_workout;
mod gym;
mod log;
mod notification;
mod page;
mod post;
mod program;
mod user;
mod workout;

pub use group_workout::{
    GroupMessage, GroupWorkout, GroupWorkoutStatus, JoinRequest, JoinRequestStatus,
    NewGroupWorkout,
};
pub use gym::{Gym, GymSearch};
pub use log::{NewWorkoutLog, WorkoutLog, WorkoutStats, RATING_RANGE};
pub use notification::{counts_field, Notification, NotificationCounts};
pub use page::Page;
pub use post::{Comment, NewPost, Post, PostAttachment, PostUpdate};
pub use program::{NewProgram, Program};
pub use user::{
    FriendRequest, FriendRequestStatus, LoginCredentials, LoginResponse, ProfileUpdate,
    ProgramRef, User, UserSummary,
};
pub use workout::{EffortType, Exercise, ExerciseSet, Workout};
