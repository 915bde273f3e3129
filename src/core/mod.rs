pub mod catalog;
pub mod delivery;
pub mod generator;
pub mod orchestrator;
pub mod store;

// Re-export commonly used types for convenience
pub use catalog::{DEFAULT_PROMPTS, PromptCatalog, SlotEntry, SlotIndex};

pub use delivery::{
    CLIP_INDEX_HEADER, ClipDelivery, DeliveredClip, DeliveryError, DeliveryResult,
    LAST_CLIP_INDEX_HEADER, SlotPicker,
};

pub use generator::{
    ClipGenerator, GeneratorError, GeneratorResult, HuggingFaceGenerator,
    HuggingFaceGeneratorConfig, MUSICGEN_SMALL_URL, SharedClipGenerator,
};

pub use orchestrator::{AcquireError, AcquireResult, ClipOrchestrator};

pub use store::{
    ClipStore, FsClipStore, MemoryClipStore, SharedClipStore, StoreError, StoreResult, StoredClip,
    create_clip_store,
};
