//! Tool provisioning core
//!
//! A [`ToolSpec`] row of the [`ToolTable`] resolves into a
//! [`ToolDescriptor`] (what to install and where) plus an [`Acquisition`]
//! strategy (how to obtain it). [`ToolInstaller`] drives one tool through
//! restore, fetch, verify and cache save.

mod descriptor;
mod installer;
mod table;

pub use descriptor::{Acquisition, ToolDescriptor};
pub use installer::{launcher_script, InstallContext, InstallSource, ToolInstaller};
pub use table::{FetchSpec, ToolSpec, ToolTable};
