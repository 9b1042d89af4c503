#[cfg(windows)]
use std::os::windows::process::CommandExt;

#[cfg(windows)]
const DETACHED_PROCESS: u32 = 0x0000_0008;
#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

/// Cut a child process loose from the spawning process so it survives the
/// parent's exit.
///
/// On Unix the child becomes the leader of a new session, so it has no
/// controlling terminal and never receives the terminal's hangup. On Windows
/// it is created as a console-less detached process in a new process group.
/// Standard streams are null on both, and anything the child later execs
/// inherits them; a relaunched application has no terminal to talk to.
pub trait Detach {
    fn detach(&mut self) -> &mut Self;
}

impl Detach for std::process::Command {
    #[cfg(unix)]
    fn detach(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;
        use std::process::Stdio;

        // SAFETY: setsid is async-signal-safe and touches no memory of the
        // forked parent.
        unsafe {
            self.pre_exec(|| {
                if libc::setsid() == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
        self.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
    }

    #[cfg(windows)]
    fn detach(&mut self) -> &mut Self {
        use std::process::Stdio;

        self.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
    }

    #[cfg(not(any(unix, windows)))]
    fn detach(&mut self) -> &mut Self {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::Detach;

    #[test]
    fn std_command_detach_is_chainable() {
        let mut cmd = std::process::Command::new("echo");
        let before = &raw mut cmd;
        let after = cmd.detach() as *mut std::process::Command;
        assert_eq!(before, after);
    }

    #[cfg(unix)]
    #[test]
    fn detached_child_runs_to_completion() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let marker = temp.path().join("marker");

        let mut child = std::process::Command::new("sh")
            .arg("-c")
            .arg(format!("echo done > '{}'", marker.display()))
            .detach()
            .spawn()
            .expect("detached child should spawn");
        let status = child.wait().expect("detached child should be waitable");

        assert!(status.success());
        assert_eq!(
            std::fs::read_to_string(&marker).expect("marker should be written"),
            "done\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn detached_child_leads_its_own_session() {
        let mut child = std::process::Command::new("sleep")
            .arg("30")
            .detach()
            .spawn()
            .expect("detached child should spawn");
        let pid = libc::pid_t::try_from(child.id()).expect("pid should fit pid_t");

        // SAFETY: getsid only reads process metadata.
        let (child_session, own_session) = unsafe { (libc::getsid(pid), libc::getsid(0)) };

        let _ = child.kill();
        let _ = child.wait();
        assert_eq!(child_session, pid);
        assert_ne!(child_session, own_session);
    }
}
