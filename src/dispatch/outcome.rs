/// Terminal outcome of one dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// No pipeline matched the path.
    NotFound,
    /// A stage produced a response.
    Completed,
    /// A stage failed, or the chain produced nothing.
    Errored,
    /// The chain panicked and was recovered.
    Recovered,
    /// The execution budget elapsed first.
    TimedOut,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::NotFound => "not_found",
            Outcome::Completed => "completed",
            Outcome::Errored => "errored",
            Outcome::Recovered => "recovered",
            Outcome::TimedOut => "timed_out",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
