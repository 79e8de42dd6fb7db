use proptest::prelude::*;

/// A registry operation applied during a property run
#[derive(Debug, Clone)]
pub enum RegistryOp {
    /// Register subscriber `slot` for `callback_id`
    Register { slot: usize, callback_id: i32 },
    /// Unregister subscriber `slot`
    Unregister { slot: usize },
}

/// Strategy for small callback ids so that collisions are common
pub fn callback_id_strategy() -> impl Strategy<Value = i32> {
    1..6i32
}

/// Strategy for client/server flags
pub fn game_server_strategy() -> impl Strategy<Value = bool> {
    any::<bool>()
}

/// Strategy for subscriber contexts of a fixed-size pool
pub fn subscriber_pool_strategy(size: usize) -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(game_server_strategy(), size)
}

/// Strategy for interleaved register/unregister sequences over `slots` subscribers
pub fn registry_ops_strategy(slots: usize) -> impl Strategy<Value = Vec<RegistryOp>> {
    let op = prop_oneof![
        3 => (0..slots, callback_id_strategy())
            .prop_map(|(slot, callback_id)| RegistryOp::Register { slot, callback_id }),
        1 => (0..slots).prop_map(|slot| RegistryOp::Unregister { slot }),
    ];
    prop::collection::vec(op, 0..40)
}

/// Strategy for valid call handles
pub fn call_handle_strategy() -> impl Strategy<Value = u64> {
    1..64u64
}
