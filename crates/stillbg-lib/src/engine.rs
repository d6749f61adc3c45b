// SPDX-License-Identifier: MPL-2.0

use crate::{
    draw::Canvas,
    wallpaper::{RenderTarget, Wallpaper},
};
use eyre::{Context, eyre};
use sctk::{
    compositor::{CompositorHandler, CompositorState},
    delegate_compositor, delegate_layer, delegate_output, delegate_registry, delegate_shm,
    output::{OutputHandler, OutputInfo, OutputState},
    reexports::{
        calloop,
        calloop_wayland_source::WaylandSource,
        client::{
            Connection, Proxy, QueueHandle, delegate_noop,
            globals::registry_queue_init,
            protocol::{
                wl_output::{self, WlOutput},
                wl_shm, wl_surface,
            },
        },
        protocols::wp::viewporter::client::{wp_viewport, wp_viewporter},
    },
    registry::{ProvidesRegistryState, RegistryState},
    registry_handlers,
    shell::{
        WaylandSurface,
        wlr_layer::{
            Anchor, KeyboardInteractivity, Layer, LayerShell, LayerShellHandler, LayerSurface,
            LayerSurfaceConfigure,
        },
    },
    shm::{Shm, ShmHandler, slot::SlotPool},
};
use stillbg_config::{Entry, OutputSelector};

/// Access glibc malloc tunables.
#[cfg(target_env = "gnu")]
mod malloc {
    use std::os::raw::c_int;
    const M_MMAP_THRESHOLD: c_int = -3;

    unsafe extern "C" {
        fn malloc_trim(pad: usize);
        fn mallopt(param: c_int, value: c_int) -> c_int;
    }

    /// Hands large resampling buffers straight back to the OS once freed.
    pub fn limit_mmap_threshold() {
        unsafe {
            mallopt(M_MMAP_THRESHOLD, 65536);
        }
    }

    /// Asks glibc to trim malloc arenas.
    pub fn trim() {
        unsafe {
            malloc_trim(0);
        }
    }
}

#[derive(Debug)]
pub struct EngineConfig {
    pub entry: Entry,
}

impl EngineConfig {
    pub fn new(entry: Entry) -> Self {
        Self { entry }
    }
}

#[derive(Debug)]
pub struct BackgroundEngine;

impl BackgroundEngine {
    /// Paints the configured background and blocks until the compositor
    /// connection closes.
    pub fn run(config: EngineConfig) -> eyre::Result<()> {
        #[cfg(target_env = "gnu")]
        malloc::limit_mmap_threshold();

        // Decode before connecting so a bad image never leaves surfaces behind.
        let wallpaper = Wallpaper::load(config.entry).wrap_err("failed to load background")?;

        let conn = Connection::connect_to_env().wrap_err("wayland client connection failed")?;

        let mut event_loop: calloop::EventLoop<'static, StillBg> =
            calloop::EventLoop::try_new().wrap_err("failed to create event loop")?;

        let (globals, mut event_queue) =
            registry_queue_init(&conn).wrap_err("failed to initialize registry queue")?;

        let qh = event_queue.handle();

        let layer_state = LayerShell::bind(&globals, &qh).map_err(|err| {
            eyre!(
                "stillbg requires the compositor to support the wlr-layer-shell extension: {err}"
            )
        })?;

        let mut bg_state = StillBg {
            registry_state: RegistryState::new(&globals),
            output_state: OutputState::new(&globals, &qh),
            compositor_state: CompositorState::bind(&globals, &qh)
                .wrap_err("wl_compositor is not available")?,
            shm_state: Shm::bind(&globals, &qh).wrap_err("wl_shm is not available")?,
            layer_state,
            viewporter: globals.bind(&qh, 1..=1, ()).ok(),
            qh,
            exit: false,
            error: None,
            initialized: false,
            wallpaper,
        };

        // Output descriptions arrive in response to the binds above.
        event_queue
            .roundtrip(&mut bg_state)
            .wrap_err("failed to discover outputs")?;

        let result = bg_state
            .create_layers()
            .and_then(|()| {
                WaylandSource::new(conn.clone(), event_queue)
                    .insert(event_loop.handle())
                    .map_err(|err| err.error)
                    .wrap_err("failed to insert main EventLoop into WaylandSource")
            })
            .and_then(|_| bg_state.dispatch(&mut event_loop, &conn));

        bg_state.teardown();
        if let Err(err) = conn.flush() {
            tracing::debug!(?err, "failed to flush compositor connection");
        }

        result
    }
}

#[derive(Debug)]
pub struct StillBgLayer {
    pub(crate) layer: LayerSurface,
    pub(crate) viewport: Option<wp_viewport::WpViewport>,
    pub(crate) wl_output: WlOutput,
    pub(crate) output_info: OutputInfo,
    pub(crate) pool: Option<SlotPool>,
    pub(crate) needs_redraw: bool,
    /// Logical size from the last configure.
    pub(crate) size: Option<(u32, u32)>,
    /// Integer scale factor of the output.
    pub(crate) scale: u32,
}

/// Buffer size of a `logical` sized surface on an output with an integer `scale`.
fn physical_size(logical: (u32, u32), scale: u32) -> (u32, u32) {
    let scale = scale.max(1);
    (logical.0 * scale, logical.1 * scale)
}

/// Layer size to use for a configure, falling back to the output's logical size
/// when the compositor leaves the choice to us.
fn configured_size(new_size: (u32, u32), output_logical: Option<(i32, i32)>) -> Option<(u32, u32)> {
    match new_size {
        (0, _) | (_, 0) => output_logical
            .filter(|&(w, h)| w > 0 && h > 0)
            .map(|(w, h)| (w as u32, h as u32)),
        size => Some(size),
    }
}

impl StillBgLayer {
    fn output_name(&self) -> &str {
        self.output_info.name.as_deref().unwrap_or("unknown")
    }

    fn set_scale(&mut self, scale: i32) -> bool {
        let scale = scale.max(1) as u32;
        if scale == self.scale {
            return false;
        }

        tracing::debug!(output = self.output_name(), scale, "output scale changed");
        self.scale = scale;
        self.needs_redraw = true;
        true
    }
}

impl RenderTarget for StillBgLayer {
    fn physical_size(&self) -> Option<(u32, u32)> {
        self.pool.as_ref()?;
        self.size.map(|size| physical_size(size, self.scale))
    }

    fn needs_redraw(&self) -> bool {
        self.needs_redraw
    }

    fn present(
        &mut self,
        paint: &mut dyn FnMut(&mut Canvas<'_>) -> eyre::Result<()>,
    ) -> eyre::Result<()> {
        let (Some((logical_w, logical_h)), Some((width, height))) =
            (self.size, self.physical_size())
        else {
            return Ok(());
        };
        let Some(pool) = self.pool.as_mut() else {
            return Ok(());
        };

        let (buffer, data) = pool
            .create_buffer(
                width as i32,
                height as i32,
                width as i32 * 4,
                wl_shm::Format::Xrgb8888,
            )
            .wrap_err("failed to create buffer")?;

        paint(&mut Canvas::new(data, width, height))?;

        let surface = self.layer.wl_surface();
        match &self.viewport {
            Some(viewport) => viewport.set_destination(logical_w as i32, logical_h as i32),
            None => surface.set_buffer_scale(self.scale as i32),
        }
        surface.damage_buffer(0, 0, width as i32, height as i32);
        buffer
            .attach_to(surface)
            .map_err(|err| eyre!("failed to attach buffer: {err:?}"))?;
        self.layer.commit();

        self.needs_redraw = false;
        tracing::debug!(output = self.output_name(), width, height, "presented background");
        Ok(())
    }
}

pub struct StillBg {
    registry_state: RegistryState,
    output_state: OutputState,
    compositor_state: CompositorState,
    shm_state: Shm,
    layer_state: LayerShell,
    viewporter: Option<wp_viewporter::WpViewporter>,
    qh: QueueHandle<StillBg>,
    exit: bool,
    /// Fatal error raised inside an event handler.
    error: Option<eyre::Report>,
    /// Layers have been created for the outputs present at startup.
    initialized: bool,
    pub(crate) wallpaper: Wallpaper,
}

impl std::fmt::Debug for StillBg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StillBg")
            .field("exit", &self.exit)
            .field("initialized", &self.initialized)
            .field("wallpaper", &self.wallpaper)
            .field("viewporter", &self.viewporter.is_some())
            .finish_non_exhaustive()
    }
}

impl StillBg {
    fn create_layers(&mut self) -> eyre::Result<()> {
        let selector = self.wallpaper.entry.output;
        let outputs: Vec<WlOutput> = self.output_state.outputs().collect();

        tracing::info!(output = %selector, outputs = outputs.len(), "Using output");

        match selector {
            OutputSelector::Index(index) if index >= outputs.len() => {
                return Err(eyre!(
                    "output {index} does not exist, {} outputs available",
                    outputs.len()
                ));
            }
            OutputSelector::All if outputs.is_empty() => {
                return Err(eyre!("no outputs available"));
            }
            _ => {}
        }

        for (index, output) in outputs.into_iter().enumerate() {
            if !selector.matches(index) {
                continue;
            }

            let Some(output_info) = self.output_state.info(&output) else {
                tracing::warn!(index, "output has no description, skipping");
                continue;
            };

            let layer = self.new_layer(output, output_info);
            self.wallpaper.layers.push(layer);
        }

        self.initialized = true;
        Ok(())
    }

    #[must_use]
    pub fn new_layer(&self, output: WlOutput, output_info: OutputInfo) -> StillBgLayer {
        let surface = self.compositor_state.create_surface(&self.qh);

        let layer = self.layer_state.create_layer_surface(
            &self.qh,
            surface.clone(),
            Layer::Background,
            Some("wallpaper"),
            Some(&output),
        );

        layer.set_anchor(Anchor::all());
        layer.set_exclusive_zone(-1);
        layer.set_keyboard_interactivity(KeyboardInteractivity::None);
        surface.commit();

        let viewport = self
            .viewporter
            .as_ref()
            .map(|viewporter| viewporter.get_viewport(&surface, &self.qh, ()));

        tracing::info!(
            output = ?output_info.name,
            scale = output_info.scale_factor,
            "Created background surface"
        );

        StillBgLayer {
            layer,
            viewport,
            wl_output: output,
            scale: output_info.scale_factor.max(1) as u32,
            output_info,
            size: None,
            pool: None,
            needs_redraw: false,
        }
    }

    fn dispatch(
        &mut self,
        event_loop: &mut calloop::EventLoop<'static, StillBg>,
        conn: &Connection,
    ) -> eyre::Result<()> {
        loop {
            if let Err(err) = event_loop.dispatch(None, self) {
                return match conn.protocol_error() {
                    Some(protocol_error) => {
                        Err(eyre!("compositor protocol error: {protocol_error}"))
                    }
                    None => {
                        tracing::info!(?err, "compositor connection closed");
                        Ok(())
                    }
                };
            }

            if let Some(err) = self.error.take() {
                return Err(err);
            }

            if self.exit {
                return Ok(());
            }
        }
    }

    fn teardown(&mut self) {
        let count = self.wallpaper.layers.len();
        self.wallpaper.layers.clear();
        tracing::debug!(count, "destroyed background surfaces");
    }

    fn layers_gone(&mut self) {
        if self.wallpaper.layers.is_empty() {
            tracing::info!("no background surfaces left, exiting");
            self.exit = true;
        }
    }
}

impl CompositorHandler for StillBg {
    fn scale_factor_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        surface: &wl_surface::WlSurface,
        new_factor: i32,
    ) {
        if let Some(layer) = self
            .wallpaper
            .layers
            .iter_mut()
            .find(|layer| layer.layer.wl_surface() == surface)
        {
            if layer.set_scale(new_factor) {
                self.wallpaper.draw();
            }
        }
    }

    fn transform_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_transform: wl_output::Transform,
    ) {
    }

    fn frame(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _time: u32,
    ) {
    }

    fn surface_enter(
        &mut self,
        _: &Connection,
        _: &QueueHandle<Self>,
        _: &wl_surface::WlSurface,
        _: &WlOutput,
    ) {
    }

    fn surface_leave(
        &mut self,
        _: &Connection,
        _: &QueueHandle<Self>,
        _: &wl_surface::WlSurface,
        _: &WlOutput,
    ) {
    }
}

impl OutputHandler for StillBg {
    fn output_state(&mut self) -> &mut OutputState {
        &mut self.output_state
    }

    fn new_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        wl_output: wl_output::WlOutput,
    ) {
        let Some(output_info) = self.output_state.info(&wl_output) else {
            return;
        };

        tracing::info!(
            output_name = ?output_info.name,
            output_id = wl_output.id().protocol_id(),
            scale = output_info.scale_factor,
            "New output discovered"
        );

        if self.initialized {
            tracing::info!(
                output_name = ?output_info.name,
                "ignoring output added after startup"
            );
        }
    }

    fn update_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        output: wl_output::WlOutput,
    ) {
        let Some(output_info) = self.output_state.info(&output) else {
            return;
        };

        if let Some(layer) = self
            .wallpaper
            .layers
            .iter_mut()
            .find(|layer| layer.wl_output == output)
        {
            let scale = output_info.scale_factor;
            layer.output_info = output_info;
            if layer.set_scale(scale) {
                self.wallpaper.draw();
            }
        }
    }

    fn output_destroyed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        output: wl_output::WlOutput,
    ) {
        let before = self.wallpaper.layers.len();
        self.wallpaper.layers.retain(|layer| layer.wl_output != output);

        if self.wallpaper.layers.len() != before {
            tracing::info!(output_id = output.id().protocol_id(), "Output removed");
            self.layers_gone();
        }
    }
}

impl LayerShellHandler for StillBg {
    fn closed(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, dropped_layer: &LayerSurface) {
        self.wallpaper
            .layers
            .retain(|layer| &layer.layer != dropped_layer);
        self.layers_gone();
    }

    fn configure(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        layer: &LayerSurface,
        configure: LayerSurfaceConfigure,
        _serial: u32,
    ) {
        let span = tracing::debug_span!("<StillBg as LayerShellHandler>::configure");
        let _handle = span.enter();

        let Some(w_layer) = self
            .wallpaper
            .layers
            .iter_mut()
            .find(|l| &l.layer == layer)
        else {
            return;
        };

        let Some(size) = configured_size(configure.new_size, w_layer.output_info.logical_size)
        else {
            tracing::warn!(output = w_layer.output_name(), "configure without a usable size");
            return;
        };

        w_layer.size = Some(size);
        w_layer.needs_redraw = true;

        let (width, height) = physical_size(size, w_layer.scale);
        let len = width as usize * height as usize * 4;

        if let Some(pool) = w_layer.pool.as_mut() {
            if let Err(why) = pool.resize(len) {
                tracing::error!(?why, "failed to resize pool");
                self.error = Some(eyre!("failed to resize buffer pool: {why}"));
                return;
            }
        } else {
            match SlotPool::new(len, &self.shm_state) {
                Ok(pool) => {
                    w_layer.pool.replace(pool);
                }
                Err(why) => {
                    tracing::error!(?why, "failed to create pool");
                    self.error = Some(eyre!("failed to create surface buffer pool: {why}"));
                    return;
                }
            }
        }

        self.wallpaper.draw();

        #[cfg(target_env = "gnu")]
        malloc::trim();
    }
}

impl ShmHandler for StillBg {
    fn shm_state(&mut self) -> &mut Shm {
        &mut self.shm_state
    }
}

delegate_compositor!(StillBg);
delegate_output!(StillBg);
delegate_shm!(StillBg);
delegate_layer!(StillBg);
delegate_registry!(StillBg);
delegate_noop!(StillBg: wp_viewporter::WpViewporter);
delegate_noop!(StillBg: wp_viewport::WpViewport);

impl ProvidesRegistryState for StillBg {
    fn registry(&mut self) -> &mut RegistryState {
        &mut self.registry_state
    }
    registry_handlers![OutputState];
}
