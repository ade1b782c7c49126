mod submitter;

pub use submitter::SubmitterId;
