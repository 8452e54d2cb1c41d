use larp_campaign::{Campaigns, init};
use larp_kernel::prelude::ApiConfig;

#[test]
fn init_creates_slice() {
    let slice = init(&ApiConfig::default()).expect("init should succeed");
    assert_eq!(slice.id, std::any::TypeId::of::<Campaigns>());
    assert_eq!(slice.name(), "campaigns");
}
