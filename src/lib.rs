//! # chromagraph: pull-based filter graphs for colour management
//!
//! Processing stages are [`FilterNode`](pipeline::FilterNode)s living in a
//! [`Session`](pipeline::Session) arena. Nodes expose typed input plugs and
//! output sockets; linking a plug to a socket is validated against the
//! connectors' [`ConnectorPattern`](pipeline::ConnectorPattern)s. Data is
//! pulled: running the last node of a chain resolves its inputs recursively,
//! and a [`PixelAccessTicket`](pipeline::PixelAccessTicket) carries the
//! region of interest and the destination array along the way.
//!
//! ## Architecture
//!
//! - **pipeline**: arena, connectors, nodes, graph snapshots, tickets and
//!   the resolve protocol
//! - **conversion**: driver that pulls a ticket through a chain and retries
//!   once after preparing backend contexts
//! - **config**: TOML engine settings under the platform config directory
//! - **Events**: crossbeam channels carry structural notifications
//!
//! ## Example
//!
//! ```ignore
//! use chromagraph::conversion::Conversion;
//! use chromagraph::pipeline::nodes::{OutputNode, RootNode};
//! use chromagraph::pipeline::Session;
//! use std::sync::Arc;
//!
//! let mut session = Session::new();
//! let root = RootNode::attach(&mut session, image)?;
//! let out = session.create_node(Arc::new(OutputNode))?;
//! session.connect(root, None, out, None)?;
//!
//! let mut conversion = Conversion::new(root, out);
//! let ticket = conversion.run(&mut session)?;
//! ```

pub mod config;
pub mod conversion;
pub mod error;
pub mod geometry;
pub mod image;
pub mod logging;
pub mod options;
pub mod pipeline;
pub mod registration;

// Re-export commonly used types
pub use config::EngineConfig;
pub use conversion::{Conversion, ConversionEnd};
pub use error::{ChromaError, Result, ResultExt};
pub use geometry::{NormalizedRect, PixelRect};
pub use image::{Array2d, DataType, Image, PixelLayout};
pub use options::{OptionValue, Options};
pub use registration::registration_match;
