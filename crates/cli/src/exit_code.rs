//! Process exit codes
//!
//! Scripts rely on these values, so they never change meaning.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    /// Bad arguments or configuration
    UsageError = 2,
    /// Storage or discovery nodes unreachable or failing
    NetworkError = 3,
    NotFound = 5,
}

impl ExitCode {
    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Success),
            1 => Some(Self::GeneralError),
            2 => Some(Self::UsageError),
            3 => Some(Self::NetworkError),
            5 => Some(Self::NotFound),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl From<&ns_core::Error> for ExitCode {
    fn from(error: &ns_core::Error) -> Self {
        Self::from_i32(error.exit_code()).unwrap_or(Self::GeneralError)
    }
}
