// Copyright (C) 2023-2025  Rafael Carvalho <contact@rafaelrc.com>

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License version 3 as published by
// the Free Software Foundation.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

// SPDX-License-Identifier: GPL-3.0-only

//! Connection to the Wayland compositor and manages the Wayland Idle Inhibitor.

use wayland_client::{
    backend::ReadEventsGuard,
    delegate_noop,
    globals::{registry_queue_init, GlobalList, GlobalListContents},
    protocol::{
        wl_compositor::WlCompositor,
        wl_registry::{self, WlRegistry},
        wl_surface::WlSurface,
    },
    Connection, Dispatch, EventQueue, Proxy, QueueHandle,
};

use wayland_protocols::wp::idle_inhibit::zv1::client::{
    zwp_idle_inhibit_manager_v1::ZwpIdleInhibitManagerV1, zwp_idle_inhibitor_v1::ZwpIdleInhibitorV1,
};

use log::{debug, error, trace, warn};

use super::IdleInhibitor;
use crate::error::Error;

/// Wrapper to the Wayland objects and event queue
pub struct WaylandIdleInhibitor {
    event_queue: EventQueue<State>,
    state: State,
}

/// Wayland globals and surface
struct State {
    _compositor: WlCompositor,
    idle_inhibit_manager: ZwpIdleInhibitManagerV1,
    surface: Option<Surface>,
}

/// Off-screen surface the inhibitor is bound to. It is never rendered to and outlives every
/// inhibit cycle.
struct Surface {
    wl_surface: WlSurface,
    idle_inhibitor: Option<ZwpIdleInhibitorV1>,
}

impl WaylandIdleInhibitor {
    /// Connects to the compositor, binds the required globals and creates the anchor surface
    pub fn new() -> Result<Self, Error> {
        let connection =
            Connection::connect_to_env().map_err(|error| Error::DisplayConnect(error.into()))?;
        let (global_list, event_queue) = registry_queue_init::<State>(&connection)
            .map_err(|error| Error::DisplayConnect(error.into()))?;
        let qhandle = &event_queue.handle();

        let state = State::new(&global_list, qhandle)?;

        let mut wayland_idle_inhibitor = Self { event_queue, state };
        wayland_idle_inhibitor.roundtrip()?;

        debug!(target: "WaylandIdleInhibitor::new", "Instance built");
        Ok(wayland_idle_inhibitor)
    }

    /// Blocks until the compositor has processed every request sent so far
    fn roundtrip(&mut self) -> Result<usize, Error> {
        self.event_queue
            .roundtrip(&mut self.state)
            .map_err(|error| Error::DisplayDispatch(error.into()))
    }

    /// Enables or disables Idle inhibiting using the Wayland protocol
    pub fn set_inhibit_idle(&mut self, inhibit_idle: bool) -> Result<(), Error> {
        let state = &mut self.state;
        let qhandle = &self.event_queue.handle();
        let Some(surface) = &mut state.surface else {
            warn!(target: "WaylandIdleInhibitor::set_inhibit_idle", "Tried to change idle inhibitor status without loaded WlSurface!");
            return Ok(());
        };

        if inhibit_idle {
            if surface.idle_inhibitor.is_none() {
                surface.idle_inhibitor = Some(state.idle_inhibit_manager.create_inhibitor(
                    &surface.wl_surface,
                    qhandle,
                    (),
                ));
                self.roundtrip()?;
                debug!(target: "WaylandIdleInhibitor::set_inhibit_idle", "Created zwp_idle_inhibitor_v1");
            }
        } else if let Some(idle_inhibitor) = surface.idle_inhibitor.take() {
            idle_inhibitor.destroy();
            self.roundtrip()?;
            debug!(target: "WaylandIdleInhibitor::set_inhibit_idle", "Destroyed zwp_idle_inhibitor_v1");
        }

        Ok(())
    }
}

impl IdleInhibitor for WaylandIdleInhibitor {
    fn inhibit(&mut self) -> Result<(), Error> {
        self.set_inhibit_idle(true)
    }

    fn uninhibit(&mut self) -> Result<(), Error> {
        self.set_inhibit_idle(false)
    }

    fn is_inhibiting(&self) -> bool {
        self.state
            .surface
            .as_ref()
            .is_some_and(|surface| surface.idle_inhibitor.is_some())
    }

    fn shutdown(&mut self) -> Result<(), Error> {
        if self.state.surface.take().is_some() {
            self.event_queue
                .flush()
                .map_err(|error| Error::DisplayDispatch(error.into()))?;
            debug!(target: "WaylandIdleInhibitor::shutdown", "Surface destroyed");
        }
        Ok(())
    }

    fn wayland_queue_read_guard(&mut self) -> Result<Option<ReadEventsGuard>, Error> {
        self.event_queue
            .flush()
            .map_err(|error| Error::DisplayDispatch(error.into()))?;

        if let Some(read_guard) = self.event_queue.prepare_read() {
            return Ok(Some(read_guard));
        }

        self.wayland_dispatch_pending()?;
        self.event_queue.prepare_read().map(Some).ok_or_else(|| {
            Error::DisplayDispatch(
                "Unknown error when trying to get a read lock on the Wayland Event Queue".into(),
            )
        })
    }

    fn wayland_dispatch_pending(&mut self) -> Result<(), Error> {
        self.event_queue
            .dispatch_pending(&mut self.state)
            .map_err(|error| Error::DisplayDispatch(error.into()))?;
        Ok(())
    }
}

impl Drop for WaylandIdleInhibitor {
    fn drop(&mut self) {
        if let Err(error) = self.shutdown() {
            error!(target: "WaylandIdleInhibitor::drop", "{error}");
        }
    }
}

impl State {
    /// Creates an instance by going through the globals list and binding the relevant ones, then
    /// creates the surface.
    fn new(global_list: &GlobalList, qhandle: &QueueHandle<State>) -> Result<Self, Error> {
        let compositor: WlCompositor =
            global_list
                .bind(qhandle, 1..=6, ())
                .map_err(|source| Error::CapabilityMissing {
                    interface: WlCompositor::interface().name,
                    source,
                })?;
        let idle_inhibit_manager: ZwpIdleInhibitManagerV1 = global_list
            .bind(qhandle, 1..=1, ())
            .map_err(|source| Error::CapabilityMissing {
                interface: ZwpIdleInhibitManagerV1::interface().name,
                source,
            })?;

        let surface = Surface {
            wl_surface: compositor.create_surface(qhandle, ()),
            idle_inhibitor: None,
        };

        Ok(Self {
            _compositor: compositor,
            idle_inhibit_manager,
            surface: Some(surface),
        })
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        if let Some(idle_inhibitor) = self.idle_inhibitor.take() {
            idle_inhibitor.destroy();
        }
        self.wl_surface.destroy();
    }
}

/// Subscribes to the [WlRegistry] events, mainly to treat added and removed objects
impl Dispatch<WlRegistry, GlobalListContents> for State {
    fn event(
        _state: &mut Self,
        _proxy: &WlRegistry,
        event: <WlRegistry as Proxy>::Event,
        _data: &GlobalListContents,
        _conn: &Connection,
        _qhandle: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } => {
                trace!(target: "WaylandIdleInhibitor::WlRegistry::Event::Global", "New {} [{}] v{}", interface, name, version);
            }
            wl_registry::Event::GlobalRemove { name } => {
                trace!(target: "WaylandIdleInhibitor::WlRegistry::Event::GlobalRemove", "Removed {}", name);
            }
            _ => unreachable!(),
        }
    }
}

// These interfaces have no events.
delegate_noop!(State: WlCompositor);
delegate_noop!(State: ZwpIdleInhibitManagerV1);
delegate_noop!(State: ZwpIdleInhibitorV1);

// Ignore events from these object types.
delegate_noop!(State: ignore WlSurface);

#[cfg(test)]
mod tests {
    use std::{env, sync::Mutex};

    use super::*;

    // Both tests read the Wayland environment, and one of them rewrites it
    static ENVIRONMENT: Mutex<()> = Mutex::new(());

    #[test]
    fn missing_compositor_is_a_connect_error() {
        let _guard = ENVIRONMENT.lock().unwrap_or_else(|poison| poison.into_inner());
        let display = env::var_os("WAYLAND_DISPLAY");
        let socket = env::var_os("WAYLAND_SOCKET");
        env::set_var("WAYLAND_DISPLAY", "/nonexistent/caffeinated-wayland-0");
        env::remove_var("WAYLAND_SOCKET");

        let result = WaylandIdleInhibitor::new();

        match display {
            Some(display) => env::set_var("WAYLAND_DISPLAY", display),
            None => env::remove_var("WAYLAND_DISPLAY"),
        }
        if let Some(socket) = socket {
            env::set_var("WAYLAND_SOCKET", socket);
        }
        assert!(matches!(result, Err(Error::DisplayConnect(_))));
    }

    #[test]
    #[ignore = "needs a compositor exposing zwp_idle_inhibit_manager_v1"]
    fn inhibitor_follows_cycles_and_surface_outlives_them() {
        let _guard = ENVIRONMENT.lock().unwrap_or_else(|poison| poison.into_inner());
        let mut inhibitor = WaylandIdleInhibitor::new().unwrap();
        assert!(inhibitor.state.surface.is_some());
        assert!(!inhibitor.is_inhibiting());

        for _ in 0..2 {
            inhibitor.inhibit().unwrap();
            inhibitor.inhibit().unwrap();
            assert!(inhibitor.is_inhibiting());

            inhibitor.uninhibit().unwrap();
            inhibitor.uninhibit().unwrap();
            assert!(!inhibitor.is_inhibiting());
            assert!(inhibitor.state.surface.is_some());
        }

        inhibitor.inhibit().unwrap();
        inhibitor.shutdown().unwrap();
        assert!(inhibitor.state.surface.is_none());
        assert!(!inhibitor.is_inhibiting());
        inhibitor.shutdown().unwrap();

        // Without a surface there is nothing to inhibit
        inhibitor.inhibit().unwrap();
        assert!(!inhibitor.is_inhibiting());
    }
}
