//! Background jobs
//!
//! - JobTable: fixed number of slots holding the pid and a copy of the command
//! - ChildWatcher: SIGCHLD driven queue of terminated background processes
//! - JobControl: owns both and is passed to the launchers by the shell loop
use crate::{
    color::{paint, PID_COLOR},
    error::LaunchError,
    helper::syscall,
};
use log::{debug, info, warn};
use nix::{
    sys::wait::{waitpid, WaitPidFlag, WaitStatus},
    unistd::Pid,
};
use signal_hook::{consts::SIGCHLD, iterator::Signals};
use std::{collections::VecDeque, io};

/// A running background process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub pid: Pid,
    pub command: Vec<String>, // owned copy of the argument vector
}

impl Job {
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

/// Registry of background processes. A free slot is None
#[derive(Debug)]
pub struct JobTable {
    slots: Vec<Option<Job>>,
}

impl JobTable {
    pub fn new(capacity: usize) -> Self {
        JobTable {
            slots: vec![None; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(|s| s.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.is_none())
    }

    /// Stores a copy of `command` in the first free slot
    pub fn insert(&mut self, pid: Pid, command: &[String]) -> Result<(), LaunchError> {
        let capacity = self.capacity();
        let Some(slot) = self.slots.iter_mut().find(|s| s.is_none()) else {
            warn!("job table full, pid {pid} not registered");
            return Err(LaunchError::JobTableFull(capacity));
        };

        *slot = Some(Job {
            pid,
            command: command.to_vec(),
        });
        println!("[{}] started in the background", paint(PID_COLOR, pid));
        info!("background job {pid} started: {}", command.join(" "));
        Ok(())
    }

    /// Frees the slot of `pid` and returns its job. Does nothing if `pid` is unknown
    pub fn remove(&mut self, pid: Pid) -> Option<Job> {
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.as_ref().map_or(false, |j| j.pid == pid))?;
        let job = slot.take()?;

        println!("[{}] done", paint(PID_COLOR, pid));
        println!("{}", job.command_line());
        info!("background job {pid} done: {}", job.command_line());
        Some(job)
    }

    /// Occupied slots in slot order
    pub fn list(&self) -> impl Iterator<Item = &Job> {
        self.slots.iter().flatten()
    }

    pub fn pids(&self) -> Vec<Pid> {
        self.list().map(|j| j.pid).collect()
    }
}

/// Records terminated background processes.
///
/// Every SIGCHLD makes the next poll reap all terminated tracked children,
/// so none is lost even if several terminate before the shell polls.
pub struct ChildWatcher {
    signals: Option<Signals>, // None until armed
    completed: VecDeque<Pid>,
    capacity: usize,
}

impl ChildWatcher {
    pub fn new(capacity: usize) -> Self {
        ChildWatcher {
            signals: None,
            completed: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.signals.is_some()
    }

    /// Starts listening for SIGCHLD. Must be called before the first background child is spawned.
    /// Calling it again does nothing.
    pub fn arm(&mut self) -> io::Result<()> {
        if self.signals.is_none() {
            self.signals = Some(Signals::new(&[SIGCHLD])?);
            debug!("SIGCHLD watcher armed");
        }
        Ok(())
    }

    /// Reaps every terminated process among `pids` without blocking
    pub fn drain(&mut self, pids: &[Pid]) {
        let flag = Some(WaitPidFlag::WNOHANG);
        for &pid in pids {
            if self.completed.contains(&pid) {
                continue;
            }

            let done = match syscall(|| waitpid(pid, flag)) {
                Ok(WaitStatus::Exited(_, status)) => {
                    debug!("pid {pid} exited: status = {status}");
                    true
                }
                Ok(WaitStatus::Signaled(_, sig, _)) => {
                    debug!("pid {pid} killed by {sig}");
                    true
                }
                Ok(_) => false, // still running
                Err(nix::Error::ECHILD) => {
                    // already reaped: nothing left to wait for
                    debug!("pid {pid} is not a child anymore");
                    true
                }
                Err(e) => {
                    warn!("waitpid({pid}) failed: {e}");
                    false
                }
            };

            if done && self.completed.len() < self.capacity {
                self.completed.push_back(pid);
            }
        }
    }

    /// Returns one terminated pid, if any.
    /// Pending SIGCHLDs are consumed and `pids` reaped first.
    pub fn poll_completed(&mut self, pids: &[Pid]) -> Option<Pid> {
        let delivered = match &mut self.signals {
            Some(signals) => signals.pending().count() > 0,
            None => false,
        };
        if delivered {
            self.drain(pids);
        }
        self.completed.pop_front()
    }
}

/// Background job state owned by the shell loop
pub struct JobControl {
    table: JobTable,
    watcher: ChildWatcher,
}

impl JobControl {
    pub fn new(capacity: usize) -> Self {
        JobControl {
            table: JobTable::new(capacity),
            watcher: ChildWatcher::new(capacity),
        }
    }

    /// Checks that one more job can be registered and arms the watcher.
    /// Called before a background child is spawned.
    pub fn prepare_background(&mut self) -> Result<(), LaunchError> {
        if self.table.is_full() {
            return Err(LaunchError::JobTableFull(self.table.capacity()));
        }
        self.watcher.arm().map_err(LaunchError::Watch)
    }

    /// Registers a spawned background child and makes one non-blocking reap attempt
    pub fn register(&mut self, pid: Pid, command: &[String]) -> Result<(), LaunchError> {
        self.table.insert(pid, command)?;
        let pids = self.table.pids();
        self.watcher.drain(&pids);
        Ok(())
    }

    /// Terminated background pid, if any
    pub fn poll_completed(&mut self) -> Option<Pid> {
        let pids = self.table.pids();
        self.watcher.poll_completed(&pids)
    }

    /// Removes every terminated background job from the table. Called once per loop iteration
    pub fn reap_finished(&mut self) -> Vec<Job> {
        let mut done = Vec::new();
        while let Some(pid) = self.poll_completed() {
            if let Some(job) = self.table.remove(pid) {
                done.push(job);
            }
        }
        done
    }

    /// Running background jobs in table order
    pub fn list(&self) -> Vec<&Job> {
        self.table.list().collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::{
        process::Command,
        thread,
        time::{Duration, Instant},
    };

    fn v(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_insert_remove() {
        let mut table = JobTable::new(4);
        assert!(table.is_empty());

        table.insert(Pid::from_raw(100), &v(&["sleep", "5"])).unwrap();
        table.insert(Pid::from_raw(200), &v(&["yes"])).unwrap();
        assert_eq!(table.pids(), vec![Pid::from_raw(100), Pid::from_raw(200)]);

        let job = table.remove(Pid::from_raw(100)).unwrap();
        assert_eq!(job.command, v(&["sleep", "5"]));
        assert_eq!(table.pids(), vec![Pid::from_raw(200)]);

        // unknown pid
        assert_eq!(table.remove(Pid::from_raw(100)), None);

        // the freed slot is reused first
        table.insert(Pid::from_raw(300), &v(&["cat"])).unwrap();
        assert_eq!(table.pids(), vec![Pid::from_raw(300), Pid::from_raw(200)]);
    }

    #[test]
    fn test_table_full() {
        let mut table = JobTable::new(2);
        table.insert(Pid::from_raw(1), &v(&["a"])).unwrap();
        table.insert(Pid::from_raw(2), &v(&["b"])).unwrap();
        assert!(table.is_full());
        assert!(matches!(
            table.insert(Pid::from_raw(3), &v(&["c"])),
            Err(LaunchError::JobTableFull(2))
        ));
        assert_eq!(table.list().count(), 2);
    }

    #[test]
    fn test_command_is_copied() {
        let mut table = JobTable::new(1);
        let command = v(&["sleep", "1"]);
        table.insert(Pid::from_raw(42), &command).unwrap();
        drop(command);

        let job = table.list().next().unwrap();
        assert_eq!(job.command_line(), "sleep 1");
    }

    #[test]
    fn test_full_before_spawn() {
        let mut jobs = JobControl::new(1);
        jobs.table.insert(Pid::from_raw(7), &v(&["x"])).unwrap();
        assert!(matches!(
            jobs.prepare_background(),
            Err(LaunchError::JobTableFull(1))
        ));
        // rejected before the watcher is armed
        assert!(!jobs.watcher.is_armed());

        jobs.table.remove(Pid::from_raw(7));
        jobs.prepare_background().unwrap();
        assert!(jobs.watcher.is_armed());
        // arming twice is harmless
        jobs.prepare_background().unwrap();
        assert!(jobs.watcher.is_armed());
    }

    fn wait_for_completion(jobs: &mut JobControl, n: usize) -> Vec<Job> {
        let start = Instant::now();
        let mut done = Vec::new();
        while done.len() < n && start.elapsed() < Duration::from_secs(10) {
            done.extend(jobs.reap_finished());
            thread::sleep(Duration::from_millis(20));
        }
        done
    }

    #[test]
    fn test_reap_all_terminated() {
        let mut jobs = JobControl::new(8);
        jobs.prepare_background().unwrap();

        // both finish before the first poll; neither may be lost
        for _ in 0..2 {
            let child = Command::new("true").spawn().unwrap();
            let pid = Pid::from_raw(child.id() as i32);
            jobs.table.insert(pid, &v(&["true"])).unwrap();
        }
        thread::sleep(Duration::from_millis(200));

        let done = wait_for_completion(&mut jobs, 2);
        assert_eq!(done.len(), 2);
        assert!(jobs.list().is_empty());
        assert_eq!(jobs.poll_completed(), None);
    }

    #[test]
    fn test_running_job_stays() {
        let mut jobs = JobControl::new(8);
        jobs.prepare_background().unwrap();

        let mut child = Command::new("sleep").arg("5").spawn().unwrap();
        let pid = Pid::from_raw(child.id() as i32);
        jobs.register(pid, &v(&["sleep", "5"])).unwrap();

        assert!(jobs.reap_finished().is_empty());
        assert_eq!(jobs.list().len(), 1);

        child.kill().unwrap();
        let done = wait_for_completion(&mut jobs, 1);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].pid, pid);
        assert!(jobs.list().is_empty());
    }
}
