//! Core clock bookkeeping.
//!
//! The IAP erase and program commands need the current core clock in kHz.
//! The clock tree itself belongs to the vendor system file; here it is only
//! an opaque update routine whose result is cached.

/// Reset clock of the LPC5410x (internal RC oscillator)
pub const LPC5410X_IRC_HZ: u32 = 12_000_000;

/// Clock-update routine used when none is supplied: the part still runs
/// from its reset clock while a debugger drives the flash algorithm.
pub fn lpc5410x_reset_clock() -> u32 {
    LPC5410X_IRC_HZ
}

/// Cached `SystemCoreClock` value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreClock {
    hz: u32,
}

impl Default for CoreClock {
    fn default() -> Self {
        CoreClock {
            hz: LPC5410X_IRC_HZ,
        }
    }
}

impl CoreClock {
    pub const fn new(hz: u32) -> Self {
        CoreClock { hz }
    }

    pub fn update(&mut self, hz: u32) {
        if hz != self.hz {
            log::debug!("core clock {} Hz -> {} Hz", self.hz, hz);
        }
        self.hz = hz;
    }

    pub const fn hz(&self) -> u32 {
        self.hz
    }

    /// The unit the IAP ROM expects
    pub const fn khz(&self) -> u32 {
        self.hz / 1000
    }
}

/// System configuration of the K32W042S1M2 (Cortex-M4 core).
pub mod k32w042s1m2 {
    bitfield::bitfield! {
        /// SMC_PMPROT: allowed power modes
        #[derive(Clone, Copy, PartialEq, Eq)]
        pub struct SmcPmprot(u8);
        impl Debug;
        /// Allow high speed run mode
        pub ahsrun, _: 7;
        /// Allow very low power modes
        pub avlp, _: 5;
        /// Allow low leakage stop mode
        pub alls, _: 3;
        /// Allow very low leakage stop modes
        pub u8, avlls, _: 1, 0;
    }

    /// Watchdog is disabled during system init
    pub const DISABLE_WDOG: bool = true;

    /// External crystal or oscillator frequency
    pub const CPU_XTAL_CLK_HZ: u32 = 8_000_000;

    /// AHSRUN=1, AVLP=1, ALLS=1, AVLLS=0x3
    pub const SYSTEM_SMC_PMPROT_VALUE: u8 = 0xab;
    pub const SYSTEM_SMC_PMCTRL_VALUE: u8 = 0x00;

    /// `SystemCoreClock` before `SystemCoreClockUpdate` runs
    pub const DEFAULT_SYSTEM_CLOCK: u32 = 48_000_000;

    pub const fn pmprot() -> SmcPmprot {
        SmcPmprot(SYSTEM_SMC_PMPROT_VALUE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn khz_truncates() {
        assert_eq!(CoreClock::default().khz(), 12_000);
        assert_eq!(CoreClock::new(96_000_500).khz(), 96_000);

        let mut clock = CoreClock::default();
        clock.update(k32w042s1m2::DEFAULT_SYSTEM_CLOCK);
        assert_eq!(clock.hz(), 48_000_000);
        assert_eq!(clock.khz(), 48_000);
    }

    #[test]
    fn k32w_pmprot_fields() {
        let pmprot = k32w042s1m2::pmprot();
        assert!(pmprot.ahsrun());
        assert!(pmprot.avlp());
        assert!(pmprot.alls());
        assert_eq!(pmprot.avlls(), 3);
        assert_eq!(k32w042s1m2::SYSTEM_SMC_PMCTRL_VALUE, 0);
    }
}
