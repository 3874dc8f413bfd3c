pub use anyhow::{anyhow, bail, Result};
pub use log::{debug, error, info, trace, warn};
pub use std::io::Write;
pub use std::str::FromStr;
pub use tokio::sync::broadcast;

pub use crate::{
    bridge::{Action, Bridge},
    channels::Channels,
    command::CommandEncoder,
    config::{self, Config},
    control_loop::{Actuator, ControlLoop},
    controller::{Controller, Readings, Strategy},
    coordinator::Coordinator,
    error::Error,
    item::{BypassMode, Item, PackField, PvBrand},
    mqtt::{self, Message},
    options::Options,
    scheduler::{self, Scheduler, Timer},
    state_cache::{StateCache, StateValue},
};
