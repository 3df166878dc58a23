//! Courier adapter set
//!
//! Holds exactly one adapter per supported [`Courier`] and resolves a courier
//! to its adapter with an exhaustive match. There is no string lookup and no
//! "unknown courier" path: a courier without an adapter does not compile.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use hytrack_core::CourierAdapters;
//!
//! let adapters = CourierAdapters::new(
//!     Box::new(BlueDartAdapter::new(&config.couriers)?),
//!     Box::new(DelhiveryAdapter::new(&config.couriers)?),
//! )?;
//! let payload = adapters.for_courier(Courier::BlueDart).fetch("12345678901").await?;
//! ```

use crate::courier::Courier;
use crate::error::{Error, Result};
use crate::traits::CourierAdapter;

/// One adapter per supported courier
pub struct CourierAdapters {
    bluedart: Box<dyn CourierAdapter>,
    delhivery: Box<dyn CourierAdapter>,
}

impl CourierAdapters {
    /// Build the set, checking each adapter serves the slot it is placed in
    pub fn new(
        bluedart: Box<dyn CourierAdapter>,
        delhivery: Box<dyn CourierAdapter>,
    ) -> Result<Self> {
        for (expected, adapter) in [(Courier::BlueDart, &bluedart), (Courier::Delhivery, &delhivery)] {
            if adapter.courier() != expected {
                return Err(Error::config(format!(
                    "Adapter '{}' serves {}, but was registered for {}",
                    adapter.adapter_name(),
                    adapter.courier(),
                    expected
                )));
            }
        }

        Ok(Self { bluedart, delhivery })
    }

    /// The adapter for a courier
    pub fn for_courier(&self, courier: Courier) -> &dyn CourierAdapter {
        match courier {
            Courier::BlueDart => self.bluedart.as_ref(),
            Courier::Delhivery => self.delhivery.as_ref(),
        }
    }
}

impl std::fmt::Debug for CourierAdapters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CourierAdapters")
            .field("bluedart", &self.bluedart.adapter_name())
            .field("delhivery", &self.delhivery.adapter_name())
            .finish()
    }
}
