pub mod corpus;
pub mod replay;
