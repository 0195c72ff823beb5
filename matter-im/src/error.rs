/*
 *
 *    Copyright (c) 2020-2022 Project CHIP Authors
 *
 *    Licensed under the Apache License, Version 2.0 (the "License");
 *    you may not use this file except in compliance with the License.
 *    You may obtain a copy of the License at
 *
 *        http://www.apache.org/licenses/LICENSE-2.0
 *
 *    Unless required by applicable law or agreed to in writing, software
 *    distributed under the License is distributed on an "AS IS" BASIS,
 *    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *    See the License for the specific language governing permissions and
 *    limitations under the License.
 */

use std::{array::TryFromSliceError, fmt, str::Utf8Error, sync::PoisonError};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorCode {
    AttributeNotFound,
    Busy,
    ClusterNotFound,
    CommandNotFound,
    ConstraintError,
    Duplicate,
    EndpointNotFound,
    Invalid,
    InvalidArgument,
    InvalidCommand,
    InvalidData,
    InvalidOpcode,
    // The peer's response does not correlate with what was sent
    InvalidResponse,
    InvalidState,
    MessageTooLong,
    NoExchange,
    NoHandler,
    NoMemory,
    NoSpace,
    NoTagFound,
    NotFound,
    NotImplemented,
    ResourceExhausted,
    RwLock,
    StdIoError,
    Timeout,
    TLVNotFound,
    TLVTypeMismatch,
    TruncatedPacket,
    Utf8Fail,
}

impl From<ErrorCode> for Error {
    fn from(code: ErrorCode) -> Self {
        Self::new(code)
    }
}

pub struct Error {
    code: ErrorCode,
    #[cfg(feature = "backtrace")]
    backtrace: std::backtrace::Backtrace,
}

impl Error {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            #[cfg(feature = "backtrace")]
            backtrace: std::backtrace::Backtrace::capture(),
        }
    }

    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    #[cfg(feature = "backtrace")]
    pub const fn backtrace(&self) -> &std::backtrace::Backtrace {
        &self.backtrace
    }

    pub fn remap<F>(self, matcher: F, to: Self) -> Self
    where
        F: FnOnce(&Self) -> bool,
    {
        if matcher(&self) {
            to
        } else {
            self
        }
    }

    /// Folds every decoding failure (bad type, missing tag, truncation) into
    /// the supplied error
    pub fn map_decode(self, to: ErrorCode) -> Self {
        self.remap(|e| e.is_decode_failure(), to.into())
    }

    pub fn is_decode_failure(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::Invalid
                | ErrorCode::InvalidData
                | ErrorCode::NoTagFound
                | ErrorCode::TLVNotFound
                | ErrorCode::TLVTypeMismatch
                | ErrorCode::TruncatedPacket
                | ErrorCode::MessageTooLong
                | ErrorCode::Utf8Fail
        )
    }
}

impl Clone for Error {
    fn clone(&self) -> Self {
        Self::new(self.code)
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl From<std::io::Error> for Error {
    fn from(_e: std::io::Error) -> Self {
        Self::new(ErrorCode::StdIoError)
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(_e: PoisonError<T>) -> Self {
        Self::new(ErrorCode::RwLock)
    }
}

impl From<TryFromSliceError> for Error {
    fn from(_e: TryFromSliceError) -> Self {
        Self::new(ErrorCode::Invalid)
    }
}

impl From<Utf8Error> for Error {
    fn from(_e: Utf8Error) -> Self {
        Self::new(ErrorCode::Utf8Fail)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[cfg(not(feature = "backtrace"))]
        {
            write!(f, "Error::{}", self)?;
        }

        #[cfg(feature = "backtrace")]
        {
            writeln!(f, "Error::{} {{", self)?;
            write!(f, "{}", self.backtrace())?;
            writeln!(f, "}}")?;
        }

        Ok(())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.code())
    }
}

impl std::error::Error for Error {}
