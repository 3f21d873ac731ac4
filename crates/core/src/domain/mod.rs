pub mod conversation;
pub mod perfume;
pub mod recommendation;
