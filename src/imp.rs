// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//at the moment we only ship the headless device

mod headless;

pub use headless::{AttributeState, DiagnosticStyle, DrawRecord, HeadlessDevice};
