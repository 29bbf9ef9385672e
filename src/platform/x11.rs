use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::instrument;
use xcb::{
    x::{self, Atom, GetProperty, InternAtom, Window, ATOM_ANY},
    Connection,
};

use super::{blocking::BlockingState, ForegroundProbe};

fn intern_atom(conn: &Connection, name: &[u8]) -> Result<Atom> {
    let reply = conn.wait_for_reply(conn.send_request(&InternAtom {
        only_if_exists: false,
        name,
    }))?;
    Ok(reply.atom())
}

fn get_active_window(conn: &Connection, root: Window, active_window_atom: Atom) -> Result<Window> {
    let result = conn.wait_for_reply(conn.send_request(&GetProperty {
        delete: false,
        window: root,
        property: active_window_atom,
        r#type: ATOM_ANY,
        long_offset: 0,
        long_length: 1,
    }))?;
    result
        .value::<Window>()
        .first()
        .copied()
        .ok_or_else(|| anyhow!("_NET_ACTIVE_WINDOW is not set"))
}

fn get_pid(conn: &Connection, window: Window, pid_atom: Atom) -> Result<u32> {
    let result = conn.wait_for_reply(conn.send_request(&GetProperty {
        delete: false,
        window,
        property: pid_atom,
        r#type: ATOM_ANY,
        long_offset: 0,
        long_length: 1,
    }))?;
    result
        .value::<u32>()
        .first()
        .copied()
        .ok_or_else(|| anyhow!("Active window has no _NET_WM_PID"))
}

fn get_window_name(conn: &Connection, window: Window, wm_name_atom: Atom) -> Result<String> {
    let wm_name = conn.wait_for_reply(conn.send_request(&x::GetProperty {
        delete: false,
        window,
        property: wm_name_atom,
        r#type: x::ATOM_ANY,
        long_offset: 0,
        long_length: 1024,
    }))?;
    Ok(String::from_utf8_lossy(wm_name.value()).into_owned())
}

/// Finds the frontmost application through EWMH hints. The process name is preferred, the window
/// title is used when the window doesn't advertise its pid. Round-trips to the X server run on the
/// blocking pool.
pub struct X11Probe {
    session: BlockingState<X11Session>,
}

struct X11Session {
    connection: Connection,
    preferred_screen: usize,
    active_window_atom: Atom,
    window_name_atom: Atom,
    pid_atom: Atom,
    system: System,
}

impl X11Probe {
    pub fn new() -> Result<Self> {
        Ok(Self {
            session: BlockingState::new(X11Session::connect()?),
        })
    }
}

impl X11Session {
    fn connect() -> Result<Self> {
        let (connection, preferred_screen) = xcb::Connection::connect(None)?;
        let active_window_atom = intern_atom(&connection, b"_NET_ACTIVE_WINDOW")?;
        let window_name_atom = intern_atom(&connection, b"_NET_WM_NAME")?;
        let pid_atom = intern_atom(&connection, b"_NET_WM_PID")?;
        Ok(Self {
            connection,
            preferred_screen: preferred_screen.max(0) as usize,
            active_window_atom,
            window_name_atom,
            pid_atom,
            system: System::new(),
        })
    }

    fn process_name(&mut self, pid: u32) -> Option<String> {
        let pid = Pid::from_u32(pid);
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing(),
        );
        self.system
            .process(pid)
            .map(|process| process.name().to_string_lossy().into_owned())
    }

    #[instrument(skip(self))]
    fn frontmost(&mut self) -> Result<String> {
        // Currently the application only supports 1 x11 screen.
        let root = self
            .connection
            .get_setup()
            .roots()
            .nth(self.preferred_screen)
            .ok_or_else(|| anyhow!("Screen {} doesn't exist", self.preferred_screen))?
            .root();

        let active_window = get_active_window(&self.connection, root, self.active_window_atom)?;
        if let Ok(pid) = get_pid(&self.connection, active_window, self.pid_atom) {
            if let Some(name) = self.process_name(pid) {
                return Ok(name);
            }
        }
        get_window_name(&self.connection, active_window, self.window_name_atom)
    }
}

#[async_trait]
impl ForegroundProbe for X11Probe {
    async fn current_foreground_app(&mut self) -> Result<String> {
        self.session.run(|session| session.frontmost()).await
    }
}
