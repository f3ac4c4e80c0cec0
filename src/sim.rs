pub trait SimComponent {
    type SharedStatus;
    /// update the component, return(busy, updated)
    fn update(
        &mut self,
        shared_status: &mut Self::SharedStatus,
        current_cycle: u64,
    ) -> eyre::Result<(bool, bool)>;
}

impl<T, C> SimComponent for &mut T
where
    T: SimComponent<SharedStatus = C>,
{
    type SharedStatus = C;
    fn update(
        &mut self,
        shared_status: &mut Self::SharedStatus,
        current_cycle: u64,
    ) -> eyre::Result<(bool, bool)> {
        (*self).update(shared_status, current_cycle)
    }
}

/// drives one component cycle by cycle until it is no longer busy
#[derive(Debug)]
pub struct SimRunner<T, S> {
    sim: T,
    shared_status: S,
    current_cycle: u64,
}
impl<T, S> SimRunner<T, S>
where
    T: SimComponent<SharedStatus = S>,
{
    pub fn new(sim: T, shared_status: S) -> SimRunner<T, S> {
        SimRunner {
            sim,
            current_cycle: 0,
            shared_status,
        }
    }
    pub fn get_sim(&self) -> &T {
        &self.sim
    }
    pub fn get_shared_status(&self) -> &S {
        &self.shared_status
    }
    pub fn run(&mut self) -> eyre::Result<()> {
        loop {
            let result = self.sim.update(&mut self.shared_status, self.current_cycle)?;
            match result {
                (true, true) => {}
                (true, false) => {
                    tracing::error!(
                        "simulation is busy but not updated at cycle {}",
                        self.current_cycle
                    );
                    return Err(eyre::eyre!(
                        "simulation is busy but not updated at cycle {}",
                        self.current_cycle
                    ));
                }
                (false, _) => {
                    // not busy, so we are done
                    break;
                }
            }
            self.current_cycle += 1;
        }
        Ok(())
    }
    pub fn get_current_cycle(&self) -> u64 {
        self.current_cycle
    }
    pub fn into_inner(self) -> (T, S, u64) {
        (self.sim, self.shared_status, self.current_cycle)
    }
}
