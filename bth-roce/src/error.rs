use core::fmt;

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// Fewer bytes than the fixed header size were supplied. Carries the number of missing bytes.
    UnexpectedHeaderLength(isize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Error::*;
        match self {
            UnexpectedHeaderLength(i) => {
                write!(f, "Unexpected `Bth` header length: `{}` bytes missing", i)
            }
        }
    }
}
