//! Bring-up sequence against a scripted bus: configure the gate driver, poll its
//! status, then run the sense and speed paths that depend on the verified gain.

use drv8353_dd::ladder::LadderState;
use drv8353_dd::rpm::{EdgeCounter, SpeedSampler};
use drv8353_dd::sense::{SenseConfig, SenseMonitor};
use drv8353_dd::{CONFIGURED_CSA_GAIN, Drv8353, DrvError};
use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};

struct NoDelay;

impl embedded_hal::delay::DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

fn script(steps: &[(u16, u16)]) -> Vec<SpiTransaction<u8>> {
    steps
        .iter()
        .flat_map(|&(tx, rx)| {
            [
                SpiTransaction::transaction_start(),
                SpiTransaction::transfer(tx.to_be_bytes().to_vec(), rx.to_be_bytes().to_vec()),
                SpiTransaction::transaction_end(),
            ]
        })
        .collect()
}

static HALL_EDGES: EdgeCounter = EdgeCounter::new();

#[test]
fn verified_startup_then_sensing() {
    let mut spi = SpiMock::new(&script(&[
        (0x30B8, 0x0000),
        (0xB000, 0x00B8),
        (0x0000, 0x0000),
        (0x0000, 0x0000),
    ]));
    let mut drv = Drv8353::new(spi.clone());
    drv.configure(&mut NoDelay).unwrap();

    let status = drv.read_status().unwrap();
    assert!(status.spi_ok());
    assert!(!status.fault_any());
    spi.done();

    let config = SenseConfig::default();
    assert_eq!(config.csa_gain, CONFIGURED_CSA_GAIN.volts_per_volt());

    let volts = config.battery_volts(1786);
    assert!((volts - 21.58).abs() < 0.02);
    assert!((config.battery_percent(volts) - 49.8).abs() < 0.2);

    let ladder = LadderState::classify(config.ladder_volts(2234));
    assert_eq!(ladder, LadderState::Idle);

    let mut monitor = SenseMonitor::new(&config);
    // ~0.2 V on every CSA output: 5 A per phase.
    let amps = monitor.motor_current_amps(0, 248, 248, 248);
    assert!((amps - 5.0).abs() < 0.05);
    // One channel pinned near full scale reads as a sensing fault.
    assert_eq!(monitor.motor_current_amps(1, 4000, 248, 248), 0.0);
    assert_eq!(monitor.csa_fault_count(), 1);

    let mut sampler = SpeedSampler::new(&HALL_EDGES);
    assert_eq!(sampler.sample(10), 0.0);
    for _ in 0..48 {
        HALL_EDGES.record_edge();
    }
    let rpm = sampler.sample(1_010);
    assert!((rpm - 120.0).abs() < 1e-3);
}

#[test]
fn failed_verification_stops_everything() {
    let mut spi = SpiMock::new(&script(&[(0x30B8, 0x0000), (0xB000, 0x07FF)]));
    let mut drv = Drv8353::new(spi.clone());

    let err = drv.configure(&mut NoDelay).unwrap_err();
    assert!(matches!(err, DrvError::GainMismatch { actual: 0b11, .. }));
    assert!(drv.is_halted());
    assert!(matches!(drv.read_id(), Err(DrvError::Halted)));
    assert!(matches!(drv.write_register(0x6, 0x0B8), Err(DrvError::Halted)));
    spi.done();
}
