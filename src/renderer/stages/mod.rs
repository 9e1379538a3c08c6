//! Post-Process Stages
//!
//! Each stage owns its passes and drives their uniforms for one frame:
//!
//! ```text
//! scene ──▶ BloomStage ──▶ N level outputs ──┐
//!   │                                        ├──▶ CompositeStage ──▶ output
//!   └─────▶ SmaaStage ───▶ AA output ────────┘
//! ```

pub mod bloom;
pub mod composite;
pub mod smaa;

pub use bloom::BloomStage;
pub use composite::CompositeStage;
pub use smaa::{LookupTextures, SmaaStage};
