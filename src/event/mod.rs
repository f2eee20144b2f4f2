// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The per-event data model: one record per refinement level, all optional,
//! later levels only ever added.

mod dl0;
mod dl1;
mod dl2;
mod monitor;
mod parameters;
mod pointing;
mod r0;
mod r1;
mod simulation;

pub use dl0::Dl0Camera;
pub use dl1::Dl1Camera;
pub use dl2::{
    Dl2Event, ReconstructedEnergy, ReconstructedGeometry, TelImpactParameter, TelReconstruction,
};
pub use monitor::TelMonitor;
pub use parameters::{
    ConcentrationParameters, ExtraParameters, HillasParameters, ImageParameters,
    IntensityParameters, LeakageParameters, MorphologyParameters,
};
pub use pointing::{Pointing, TelescopePointing};
pub use r0::R0Camera;
pub use r1::R1Camera;
pub use simulation::{SimulatedCamera, SimulatedEvent, SimulatedShower};

use std::collections::BTreeMap;

use crate::subarray::TelId;

/// Map of per-telescope records for one data level of one event. Each value
/// is exclusively owned by the event.
#[derive(Clone, Debug, Default)]
pub struct TelContainer<T> {
    pub tels: BTreeMap<TelId, T>,
}

impl<T> TelContainer<T> {
    pub fn new() -> TelContainer<T> {
        TelContainer {
            tels: BTreeMap::new(),
        }
    }

    pub fn add_tel(&mut self, tel_id: TelId, record: T) {
        self.tels.insert(tel_id, record);
    }

    pub fn get(&self, tel_id: TelId) -> Option<&T> {
        self.tels.get(&tel_id)
    }

    pub fn tel_ids(&self) -> Vec<TelId> {
        self.tels.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tels.is_empty()
    }
}

pub type R0Event = TelContainer<R0Camera>;
pub type R1Event = TelContainer<R1Camera>;
pub type Dl0Event = TelContainer<Dl0Camera>;
pub type Dl1Event = TelContainer<Dl1Camera>;
pub type EventMonitor = TelContainer<TelMonitor>;

/// One trigger of the telescope array at whatever refinement levels have
/// been populated so far. Created by the event source, mutated by the
/// processors, consumed by the writer.
#[derive(Clone, Debug, Default)]
pub struct ArrayEvent {
    pub event_id: u64,
    pub run_id: i32,
    pub simulation: Option<SimulatedEvent>,
    pub r0: Option<R0Event>,
    pub r1: Option<R1Event>,
    pub dl0: Option<Dl0Event>,
    pub dl1: Option<Dl1Event>,
    pub dl2: Option<Dl2Event>,
    pub monitor: Option<EventMonitor>,
    pub pointing: Option<Pointing>,
}
