use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::models::customer::CustomerId;
use crate::models::driver::DriverId;
use crate::models::order::OrderId;

/// One async mutex per order, driver and customer.
///
/// Acquisition order is order, then driver or customer.
#[derive(Default)]
pub struct EntityLocks {
    orders: DashMap<OrderId, Arc<Mutex<()>>>,
    drivers: DashMap<DriverId, Arc<Mutex<()>>>,
    customers: DashMap<CustomerId, Arc<Mutex<()>>>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn order(&self, id: OrderId) -> OwnedMutexGuard<()> {
        acquire(&self.orders, id).await
    }

    pub async fn driver(&self, id: DriverId) -> OwnedMutexGuard<()> {
        acquire(&self.drivers, id).await
    }

    pub async fn customer(&self, id: CustomerId) -> OwnedMutexGuard<()> {
        acquire(&self.customers, id).await
    }
}

async fn acquire(locks: &DashMap<u64, Arc<Mutex<()>>>, id: u64) -> OwnedMutexGuard<()> {
    // Clone the Arc out so no map shard stays locked across the await.
    let lock = Arc::clone(&*locks.entry(id).or_default());
    lock.lock_owned().await
}
