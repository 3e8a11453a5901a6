//! Learning rate schedules consumed once per epoch by a training loop.

use log::info;

/// Piecewise-constant step decay.
///
/// Once the epoch is strictly greater than a milestone, the learning rate is
/// `initial_lr * factor` for the largest such milestone. Factors are absolute
/// multipliers of the initial rate, not compounded.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiStepLR {
    pub initial_lr: f64,
    /// `(milestone, factor)` sorted by ascending milestone.
    milestones: Vec<(usize, f64)>,
    pub current_epoch: usize,
}

impl MultiStepLR {
    pub fn new(initial_lr: f64, mut milestones: Vec<(usize, f64)>) -> Self {
        milestones.sort_by_key(|&(epoch, _)| epoch);
        MultiStepLR { initial_lr, milestones, current_epoch: 0 }
    }

    /// Schedule used for the ResNet runs: decays after epochs 60, 120, 160, 180.
    pub fn resnet() -> Self {
        Self::new(1e-3, vec![(60, 1e-1), (120, 1e-2), (160, 1e-3), (180, 0.5e-3)])
    }

    /// Schedule used for the WRN runs: decays after epochs 20, 30, 40, 45.
    pub fn wide_resnet() -> Self {
        Self::new(1e-3, vec![(20, 1e-1), (30, 1e-2), (40, 1e-3), (45, 0.5e-3)])
    }

    pub fn milestones(&self) -> &[(usize, f64)] {
        &self.milestones
    }

    /// Learning rate for an arbitrary epoch.
    pub fn lr_at(&self, epoch: usize) -> f64 {
        let factor = self
            .milestones
            .iter()
            .rev()
            .find(|&&(milestone, _)| epoch > milestone)
            .map_or(1.0, |&(_, f)| f);
        self.initial_lr * factor
    }

    /// Advance to the next epoch.
    pub fn step(&mut self) {
        self.current_epoch = self.current_epoch.saturating_add(1);
    }

    pub fn get_lr(&self) -> f64 {
        self.lr_at(self.current_epoch)
    }
}

/// Learning rate for ResNet training at `epoch`. Logs the chosen value.
pub fn lr_schedule_rn(epoch: usize) -> f64 {
    let lr = MultiStepLR::resnet().lr_at(epoch);
    info!("Learning rate: {}", lr);
    lr
}

/// Learning rate for WRN training at `epoch`. Logs the chosen value.
pub fn lr_schedule_wrn(epoch: usize) -> f64 {
    let lr = MultiStepLR::wide_resnet().lr_at(epoch);
    info!("Learning rate: {}", lr);
    lr
}
