//! Compilation pass modules.
//!
//! Each pass consumes the output of the one before it and runs exactly once
//! per compile call, in numeric order (0-5). The generator takes the output
//! of pass 5.

pub mod p0_dereference;
pub mod p1_link;
pub mod p2_validate;
pub mod p3_normalize;
pub mod p4_parse;
pub mod p5_optimize;
