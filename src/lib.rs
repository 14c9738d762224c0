//! Builds Tsung load-test plans and the CSV fixture data they read.
//!
//! A [`Plan`] collects clients, servers, arrival phases, data sources and
//! scripted [`Session`]s, then renders itself once into a Tsung XML
//! document. The fixture side loads a batch of the dataset into a
//! [`dataset::Model`] and runs the [`generator`]s over it.

extern crate combine;

use serde::Deserialize;
use std::fmt;

pub mod access;
pub mod batch;
pub mod config;
pub mod csv_writer;
pub mod dataset;
pub mod error;
pub mod format;
pub mod generator;
mod parse;
pub mod plan;
pub mod render;
pub mod script;
pub mod session;
pub mod stats;
pub mod suite;

pub use error::{Error, Result};
pub use plan::{Plan, PlanConfig};
pub use session::{Action, DynamicVariable, Request, RequestData, RequestNode, Session, Transaction};
pub use stats::PlanStatistics;

pub type Seconds = f64;
pub type Probability = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
        }
    }

    /// GET and HEAD carry their data in the query string and get no
    /// default referer.
    pub fn is_query_only(self) -> bool {
        match self {
            Method::Get | Method::Head => true,
            _ => false,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Hour,
    Minute,
    Second,
}

impl TimeUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeUnit::Hour => "hour",
            TimeUnit::Minute => "minute",
            TimeUnit::Second => "second",
        }
    }
}

/// How Tsung walks the rows of a file server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOrder {
    Iter,
    Random,
}

impl FileOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            FileOrder::Iter => "iter",
            FileOrder::Random => "random",
        }
    }
}

impl Default for FileOrder {
    fn default() -> FileOrder {
        FileOrder::Random
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
    #[serde(other)]
    Other,
}

impl Default for Visibility {
    fn default() -> Visibility {
        Visibility::Private
    }
}
