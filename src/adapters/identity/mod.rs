pub mod gotrue;
pub mod mock_identity;

pub use gotrue::GoTrueIdentity;
pub use mock_identity::MockIdentity;
