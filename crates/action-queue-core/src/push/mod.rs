pub mod bridge;

pub use bridge::{
    effect_to_trigger, event_id, prepare_push_events, program_id_of, push_event_params,
    PushEventParams,
};
