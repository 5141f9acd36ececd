// Wayland integration module
// Owns the viewer session: window, input mapping and the event loop

use crate::image_loader::{DecodedBitmap, ImageLoader};
use crate::navigation::{NavEvent, Navigator, Outcome, TextureSink};
use crate::wgpu_renderer::WgpuRenderer;
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use smithay_client_toolkit::{
    compositor::{CompositorHandler, CompositorState},
    delegate_compositor, delegate_keyboard, delegate_output, delegate_pointer,
    delegate_registry, delegate_seat, delegate_xdg_shell, delegate_xdg_window,
    output::{OutputHandler, OutputState},
    registry::{ProvidesRegistryState, RegistryState},
    registry_handlers,
    seat::{
        keyboard::{KeyEvent, KeyboardHandler, Keysym, Modifiers},
        pointer::{PointerEvent, PointerEventKind, PointerHandler},
        Capability, SeatHandler, SeatState,
    },
    shell::{
        xdg::{
            window::{Window, WindowConfigure, WindowDecorations, WindowHandler},
            XdgShell,
        },
        WaylandSurface,
    },
};
use wayland_client::{
    globals::registry_queue_init,
    protocol::{wl_keyboard, wl_output, wl_pointer, wl_seat, wl_surface},
    Connection, Proxy, QueueHandle,
};

/// Application id reported to the compositor
const APP_ID: &str = "rspix";

/// Minimum window size
const MIN_SIZE: u32 = 64;

/// Map a key press to a navigation event
fn key_to_event(keysym: Keysym) -> Option<NavEvent> {
    if keysym == Keysym::Left {
        Some(NavEvent::Retreat)
    } else if keysym == Keysym::Right {
        Some(NavEvent::Advance)
    } else if keysym == Keysym::q || keysym == Keysym::Q || keysym == Keysym::Escape {
        Some(NavEvent::Quit)
    } else {
        None
    }
}

/// Map a vertical wheel value to a zoom event (negative is scrolling up)
fn axis_to_event(vertical: f64) -> Option<NavEvent> {
    if vertical < 0.0 {
        Some(NavEvent::ZoomIn)
    } else if vertical > 0.0 {
        Some(NavEvent::ZoomOut)
    } else {
        None
    }
}

/// The viewer session: one window, one renderer, one image set
struct ViewerApp {
    registry_state: RegistryState,
    seat_state: SeatState,
    output_state: OutputState,
    compositor_state: CompositorState,
    xdg_shell: XdgShell,

    // Wayland display pointer (for GPU rendering)
    display_ptr: *mut std::ffi::c_void,

    navigator: Navigator,
    loader: ImageLoader,
    // First image, uploaded once the GPU is ready
    pending: Option<DecodedBitmap>,

    window: Option<Window>,
    width: u32,
    height: u32,
    configured: bool,

    renderer: Option<WgpuRenderer>,
    // Setup failure that ends the session
    fatal: Option<anyhow::Error>,
}

impl ViewerApp {
    #[allow(clippy::too_many_arguments)]
    fn new(
        registry_state: RegistryState,
        seat_state: SeatState,
        output_state: OutputState,
        compositor_state: CompositorState,
        xdg_shell: XdgShell,
        display_ptr: *mut std::ffi::c_void,
        navigator: Navigator,
        loader: ImageLoader,
        first: DecodedBitmap,
        window_size: (u32, u32),
    ) -> Self {
        Self {
            registry_state,
            seat_state,
            output_state,
            compositor_state,
            xdg_shell,
            display_ptr,
            navigator,
            loader,
            pending: Some(first),
            window: None,
            width: window_size.0,
            height: window_size.1,
            configured: false,
            renderer: None,
            fatal: None,
        }
    }

    fn should_exit(&self) -> bool {
        self.navigator.should_quit() || self.fatal.is_some()
    }

    /// Initialize GPU renderer from the window surface and upload the first image
    fn init_gpu_renderer(&mut self) -> Result<()> {
        let window = self.window.as_ref().context("Cannot init GPU: no window")?;

        // With wayland-backend client_system feature, ObjectId.as_ptr() is available
        let surface_ptr = window.wl_surface().id().as_ptr() as *mut std::ffi::c_void;

        info!("Initializing GPU renderer...");
        debug!("  Surface ptr: {:?}", surface_ptr);
        debug!("  Display ptr: {:?}", self.display_ptr);

        let mut renderer = WgpuRenderer::new(self.display_ptr, surface_ptr, self.width, self.height)
            .context("Failed to initialize GPU renderer")?;

        if let Some(first) = self.pending.take() {
            renderer
                .replace_texture(first)
                .context("Failed to upload the first image")?;
        }

        self.renderer = Some(renderer);
        info!("GPU renderer initialized successfully");
        Ok(())
    }

    /// Feed an input event through the navigator and refresh what changed
    fn dispatch(&mut self, event: NavEvent) {
        let Some(renderer) = self.renderer.as_mut() else {
            if event == NavEvent::Quit {
                self.navigator.quit();
            } else {
                debug!("Renderer not ready, ignoring {:?}", event);
            }
            return;
        };

        match self.navigator.handle(event, &self.loader, renderer) {
            Outcome::ImageChanged => {
                self.update_title();
                self.draw();
            }
            Outcome::Redraw => self.draw(),
            Outcome::Unchanged => {
                // A failed upload leaves no texture; show the empty frame
                if !renderer.has_texture() {
                    self.update_title();
                    self.draw();
                }
            }
            Outcome::Quit => {}
        }
    }

    fn update_title(&self) {
        if let Some(ref window) = self.window {
            let title = self.navigator.title();
            debug!("Window title: {}", title);
            window.set_title(title);
        }
    }

    /// Draw a frame with the current zoom
    fn draw(&mut self) {
        if !self.configured {
            return;
        }

        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };

        renderer.resize(self.width, self.height);

        match renderer.render(self.navigator.zoom()) {
            Ok(true) => {
                if let Some(ref window) = self.window {
                    window.wl_surface().commit();
                }
            }
            Ok(false) => debug!("Frame skipped"),
            Err(e) => warn!("GPU render error: {:?}", e),
        }
    }

    /// Release GPU resources before the Wayland objects go away
    fn shutdown(&mut self) {
        if let Some(mut renderer) = self.renderer.take() {
            renderer.release_texture();
        }
        self.window = None;
        info!("Viewer session closed");
    }
}

// Implement required traits for smithay-client-toolkit

impl CompositorHandler for ViewerApp {
    fn scale_factor_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_factor: i32,
    ) {
        debug!("Scale factor changed");
    }

    fn transform_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_transform: wl_output::Transform,
    ) {
        debug!("Transform changed");
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
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }

    fn surface_leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }
}

impl OutputHandler for ViewerApp {
    fn output_state(&mut self) -> &mut OutputState {
        &mut self.output_state
    }

    fn new_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        debug!("New output detected");
    }

    fn update_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        debug!("Output updated");
    }

    fn output_destroyed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        debug!("Output destroyed");
    }
}

impl WindowHandler for ViewerApp {
    fn request_close(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _window: &Window) {
        info!("Window closed");
        self.dispatch(NavEvent::Quit);
    }

    fn configure(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _window: &Window,
        configure: WindowConfigure,
        _serial: u32,
    ) {
        debug!("Window configured: {:?}", configure.new_size);

        // The compositor may leave the size to us; keep the current one then
        if let (Some(width), Some(height)) = configure.new_size {
            self.width = width.get();
            self.height = height.get();
        }

        self.configured = true;

        if self.renderer.is_none() {
            if let Err(e) = self.init_gpu_renderer() {
                error!("{:#}", e);
                self.fatal = Some(e);
                return;
            }
        }

        self.draw();
    }
}

impl SeatHandler for ViewerApp {
    fn seat_state(&mut self) -> &mut SeatState {
        &mut self.seat_state
    }

    fn new_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: wl_seat::WlSeat) {
        debug!("New seat");
    }

    fn new_capability(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        seat: wl_seat::WlSeat,
        capability: Capability,
    ) {
        debug!("New capability: {:?}", capability);

        if capability == Capability::Keyboard {
            if let Err(e) = self.seat_state.get_keyboard(qh, &seat, None) {
                error!("Failed to get keyboard: {}", e);
            }
        }
        if capability == Capability::Pointer {
            if let Err(e) = self.seat_state.get_pointer(qh, &seat) {
                error!("Failed to get pointer: {}", e);
            }
        }
    }

    fn remove_capability(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _seat: wl_seat::WlSeat,
        _capability: Capability,
    ) {
        debug!("Capability removed");
    }

    fn remove_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: wl_seat::WlSeat) {
        debug!("Seat removed");
    }
}

impl KeyboardHandler for ViewerApp {
    fn enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _surface: &wl_surface::WlSurface,
        _serial: u32,
        _raw: &[u32],
        _keysyms: &[Keysym],
    ) {
        debug!("Keyboard entered surface");
    }

    fn leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _surface: &wl_surface::WlSurface,
        _serial: u32,
    ) {
        debug!("Keyboard left surface");
    }

    fn press_key(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _serial: u32,
        event: KeyEvent,
    ) {
        debug!("Key pressed: {:?}", event.keysym);

        if let Some(nav_event) = key_to_event(event.keysym) {
            self.dispatch(nav_event);
        }
    }

    fn release_key(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _serial: u32,
        _event: KeyEvent,
    ) {
    }

    fn update_modifiers(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _serial: u32,
        _modifiers: Modifiers,
        _layout: u32,
    ) {
    }
}

impl PointerHandler for ViewerApp {
    fn pointer_frame(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _pointer: &wl_pointer::WlPointer,
        events: &[PointerEvent],
    ) {
        for event in events {
            if let PointerEventKind::Axis { vertical, .. } = event.kind {
                if let Some(nav_event) = axis_to_event(vertical.absolute) {
                    self.dispatch(nav_event);
                }
            }
        }
    }
}

impl ProvidesRegistryState for ViewerApp {
    fn registry(&mut self) -> &mut RegistryState {
        &mut self.registry_state
    }

    registry_handlers![OutputState, SeatState];
}

// Delegate macros
delegate_compositor!(ViewerApp);
delegate_output!(ViewerApp);
delegate_xdg_shell!(ViewerApp);
delegate_xdg_window!(ViewerApp);
delegate_seat!(ViewerApp);
delegate_keyboard!(ViewerApp);
delegate_pointer!(ViewerApp);
delegate_registry!(ViewerApp);

/// Open the viewer window and run until the user quits
pub fn run(
    navigator: Navigator,
    loader: ImageLoader,
    first: DecodedBitmap,
    window_size: (u32, u32),
) -> Result<()> {
    info!("Connecting to Wayland display");

    // Connect to Wayland display
    let conn = Connection::connect_to_env().context("Failed to connect to Wayland display")?;

    // Initialize registry and event queue
    let (globals, mut event_queue) =
        registry_queue_init(&conn).context("Failed to initialize registry")?;
    let qh = event_queue.handle();

    // Initialize required globals
    let compositor_state =
        CompositorState::bind(&globals, &qh).context("Failed to bind compositor")?;
    let xdg_shell = XdgShell::bind(&globals, &qh).context("Failed to bind xdg shell")?;

    // Get the display pointer for GPU rendering
    let display_ptr = conn.backend().display_ptr() as *mut std::ffi::c_void;

    let mut app = ViewerApp::new(
        RegistryState::new(&globals),
        SeatState::new(&globals, &qh),
        OutputState::new(&globals, &qh),
        compositor_state,
        xdg_shell,
        display_ptr,
        navigator,
        loader,
        first,
        window_size,
    );

    let surface = app.compositor_state.create_surface(&qh);
    let window = app
        .xdg_shell
        .create_window(surface, WindowDecorations::RequestServer, &qh);
    window.set_title(app.navigator.title());
    window.set_app_id(APP_ID);
    window.set_min_size(Some((MIN_SIZE, MIN_SIZE)));

    // Commit the surface to trigger configure
    window.commit();
    app.window = Some(window);

    info!("Starting event loop");
    info!("Controls: Left/Right to browse, wheel to zoom, Q to quit");

    // Main event loop
    while !app.should_exit() {
        event_queue.blocking_dispatch(&mut app)?;
    }

    app.shutdown();

    match app.fatal.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
