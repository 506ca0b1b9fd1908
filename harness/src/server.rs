//! # Summary
//!
//! Process lifecycle for one spawned `lockservice-server`. Killed on drop
//! so a harness run never leaks processes past the scenario that started
//! them, matching the reference harness's `Server` wrapper.

pub struct Server(std::process::Child);

impl Server {
    pub fn acceptor(bin: &std::path::Path, id: u64, listen: &str, verbosity: u8) -> Self {
        let mut command = std::process::Command::new(bin);
        add_verbosity(&mut command, verbosity);
        command.arg("acceptor").args(["--id", &id.to_string()]).args(["--listen", listen]);
        spawn(command)
    }

    pub fn leader(bin: &std::path::Path, id: u64, listen: &str, acceptors: &[String], verbosity: u8) -> Self {
        let mut command = std::process::Command::new(bin);
        add_verbosity(&mut command, verbosity);
        command
            .arg("leader")
            .args(["--id", &id.to_string()])
            .args(["--listen", listen])
            .args(["--acceptors", &acceptors.join(",")]);
        spawn(command)
    }

    pub fn replica(bin: &std::path::Path, id: u64, listen: &str, leaders: &[String], verbosity: u8) -> Self {
        let mut command = std::process::Command::new(bin);
        add_verbosity(&mut command, verbosity);
        command
            .arg("replica")
            .args(["--id", &id.to_string()])
            .args(["--listen", listen])
            .args(["--leaders", &leaders.join(",")]);
        spawn(command)
    }
}

fn add_verbosity(command: &mut std::process::Command, verbosity: u8) {
    if verbosity > 0 {
        command.arg(format!("-{}", "v".repeat(verbosity as usize)));
    }
}

fn spawn(mut command: std::process::Command) -> Server {
    command.spawn().map(Server).expect("[INTERNAL ERROR]: could not spawn lockservice-server")
}

impl Drop for Server {
    fn drop(&mut self) {
        self.0.kill().ok();
    }
}
