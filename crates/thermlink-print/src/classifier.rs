// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer recognition among the adapter's bonded devices.
//
// A device counts as a printer if its class-of-device says imaging/printer,
// or its name mentions "printer", or it is the built-in printer some POS
// terminals expose as a virtual Bluetooth device.

use std::sync::Arc;
use std::time::Duration;

use thermlink_bridge::{BluetoothRadio, RemoteDevice};
use thermlink_core::AppConfig;
use thermlink_core::types::{CharsetEncoding, DeviceClass, DeviceDescriptor};
use tracing::{debug, info, warn};

use crate::connector::{RobustConnector, SharedConnector};
use crate::retry::ConnectOptions;
use crate::session::blocking;

/// Major class a printer must report for a class-based match.
pub const PRINTER_MAJOR_CLASS: u16 = DeviceClass::MAJOR_IMAGING;

/// Device classes accepted under [`PRINTER_MAJOR_CLASS`].
pub const PRINTER_DEVICE_CLASSES: &[u16] = &[DeviceClass::IMAGING_PRINTER, DeviceClass::MAJOR_IMAGING];

/// Case-insensitive name substring that marks a printer.
pub const PRINTER_NAME_KEYWORD: &str = "printer";

/// Exact names of built-in printers.
pub const INTERNAL_PRINTER_NAMES: &[&str] = &["InnerPrinter"];

/// Whether a described device looks like a printer.
pub fn is_printer(desc: &DeviceDescriptor) -> bool {
    if desc.class.major == PRINTER_MAJOR_CLASS && PRINTER_DEVICE_CLASSES.contains(&desc.class.device) {
        return true;
    }
    let Some(name) = desc.name.as_deref() else {
        return false;
    };
    name.to_lowercase().contains(PRINTER_NAME_KEYWORD) || INTERNAL_PRINTER_NAMES.contains(&name)
}

/// A bonded device recognised as a printer.
#[derive(Clone)]
pub struct DiscoveredPrinter {
    pub descriptor: DeviceDescriptor,
    pub device: Arc<dyn RemoteDevice>,
}

impl std::fmt::Debug for DiscoveredPrinter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DiscoveredPrinter").field(&self.descriptor).finish()
    }
}

/// Keep the printers among `devices`, in order. A device that fails to
/// describe itself is skipped.
fn classify(devices: &[Arc<dyn RemoteDevice>]) -> Vec<DiscoveredPrinter> {
    devices
        .iter()
        .filter_map(|device| match device.describe() {
            Ok(descriptor) if is_printer(&descriptor) => {
                debug!(address = %descriptor.address, name = descriptor.label(), "printer found");
                Some(DiscoveredPrinter {
                    descriptor,
                    device: Arc::clone(device),
                })
            }
            Ok(_) => None,
            Err(e) => {
                warn!(address = device.address(), error = %e, "skipping device that could not be described");
                None
            }
        })
        .collect()
}

/// Finds printers among bonded devices and hands out connected connectors.
pub struct PrinterClassifier {
    radio: Arc<dyn BluetoothRadio>,
    options: ConnectOptions,
    charset: CharsetEncoding,
    /// Address tried ahead of the other printers.
    preferred: Option<String>,
}

impl PrinterClassifier {
    pub fn new(radio: Arc<dyn BluetoothRadio>) -> Self {
        Self {
            radio,
            options: ConnectOptions::default(),
            charset: CharsetEncoding::default(),
            preferred: None,
        }
    }

    pub fn from_config(radio: Arc<dyn BluetoothRadio>, config: &AppConfig) -> Self {
        Self::new(radio)
            .with_options(ConnectOptions::from(config))
            .with_charset(config.charset.clone())
            .with_preferred(config.preferred_device.clone())
    }

    pub fn with_options(mut self, options: ConnectOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_charset(mut self, charset: CharsetEncoding) -> Self {
        self.charset = charset;
        self
    }

    pub fn with_preferred(mut self, address: Option<String>) -> Self {
        self.preferred = address;
        self
    }

    /// Printers among `devices`, the preferred address first. Blocks on
    /// radio queries.
    pub fn list(&self, devices: &[Arc<dyn RemoteDevice>]) -> Vec<DiscoveredPrinter> {
        self.preferred_first(classify(devices))
    }

    /// Move the preferred printer, if listed, to the front. The others keep
    /// their order.
    fn preferred_first(&self, mut printers: Vec<DiscoveredPrinter>) -> Vec<DiscoveredPrinter> {
        let position = self
            .preferred
            .as_deref()
            .and_then(|addr| printers.iter().position(|p| p.descriptor.address == addr));
        if let Some(index) = position {
            let preferred = printers.remove(index);
            printers.insert(0, preferred);
        }
        printers
    }

    /// Printers among the adapter's bonded devices, the preferred address
    /// first. Enumeration failure is treated as an empty list.
    pub async fn list_bonded(&self) -> Vec<DiscoveredPrinter> {
        let radio = Arc::clone(&self.radio);
        match blocking(move || radio.bonded_devices().map(|devices| classify(&devices))).await {
            Ok(printers) => self.preferred_first(printers),
            Err(e) => {
                warn!(error = %e, "could not enumerate bonded devices");
                Vec::new()
            }
        }
    }

    /// Connect to the first printer with the classifier's options.
    pub async fn select_first(&self) -> Option<SharedConnector> {
        self.connect_first(self.options.clone()).await
    }

    pub async fn select_first_with(&self, retry_count: u32, timeout: Duration) -> Option<SharedConnector> {
        let options = ConnectOptions::new(retry_count, timeout).with_backoff(self.options.backoff);
        self.connect_first(options).await
    }

    async fn connect_first(&self, options: ConnectOptions) -> Option<SharedConnector> {
        let printers = self.list_bonded().await;
        let chosen = printers.first()?;

        info!(address = %chosen.descriptor.address, name = chosen.descriptor.label(), "selecting printer");
        let mut connector = RobustConnector::new(
            Arc::clone(&self.radio),
            Some(Arc::clone(&chosen.device)),
            self.charset.clone(),
        )
        .with_options(options);

        match connector.connect().await {
            Ok(_) => Some(connector.into_shared()),
            Err(e) => {
                warn!(address = %chosen.descriptor.address, error = %e, "printer did not connect");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockDevice, MockRadio};
    use thermlink_core::types::SPP_UUID;

    fn described(name: Option<&str>, class: DeviceClass) -> DeviceDescriptor {
        DeviceDescriptor {
            address: "AA:BB:CC:DD:EE:FF".into(),
            name: name.map(str::to_owned),
            class,
            service_ids: Some(vec![SPP_UUID]),
        }
    }

    fn fast() -> ConnectOptions {
        ConnectOptions::new(1, Duration::from_secs(5)).with_backoff(Duration::from_millis(1))
    }

    #[test]
    fn imaging_printer_class_matches() {
        assert!(is_printer(&described(None, DeviceClass::printer())));
        assert!(is_printer(&described(
            None,
            DeviceClass::new(DeviceClass::MAJOR_IMAGING, DeviceClass::MAJOR_IMAGING)
        )));
    }

    #[test]
    fn imaging_scanner_does_not_match() {
        // Imaging major class with the scanner minor bit.
        assert!(!is_printer(&described(
            Some("Flatbed"),
            DeviceClass::new(DeviceClass::MAJOR_IMAGING, 0x0640)
        )));
    }

    #[test]
    fn name_keyword_matches_case_insensitively() {
        assert!(is_printer(&described(Some("Office Printer 2"), DeviceClass::uncategorized())));
        assert!(is_printer(&described(Some("MPT-II PRINTER"), DeviceClass::uncategorized())));
        assert!(is_printer(&described(Some("InnerPrinter"), DeviceClass::uncategorized())));
    }

    #[test]
    fn unrelated_devices_do_not_match() {
        let computer = DeviceClass::new(DeviceClass::MAJOR_COMPUTER, 0x010C);
        assert!(!is_printer(&described(Some("Router"), computer)));
        assert!(!is_printer(&described(None, DeviceClass::new(DeviceClass::MAJOR_PHONE, 0))));
    }

    #[test]
    fn list_keeps_only_printers() {
        let radio: Arc<dyn BluetoothRadio> = MockRadio::new();
        let hp: Arc<dyn RemoteDevice> = MockDevice::printer().build();
        let phone: Arc<dyn RemoteDevice> = MockDevice::new(
            Some("My Phone"),
            DeviceClass::new(DeviceClass::MAJOR_PHONE, 0),
        )
        .with_address("11:11:11:11:11:11")
        .build();

        let found = PrinterClassifier::new(radio).list(&[hp, phone]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].descriptor.name.as_deref(), Some("HP LaserJet"));
    }

    #[test]
    fn list_puts_preferred_printer_first() {
        let radio: Arc<dyn BluetoothRadio> = MockRadio::new();
        let devices: Vec<Arc<dyn RemoteDevice>> = ["01:01:01:01:01:01", "02:02:02:02:02:02", "03:03:03:03:03:03"]
            .into_iter()
            .map(|addr| -> Arc<dyn RemoteDevice> { MockDevice::printer().with_address(addr).build() })
            .collect();
        let addresses = |found: Vec<DiscoveredPrinter>| -> Vec<String> {
            found.into_iter().map(|p| p.descriptor.address).collect()
        };

        let classifier = PrinterClassifier::new(radio).with_preferred(Some("03:03:03:03:03:03".into()));
        assert_eq!(
            addresses(classifier.list(&devices)),
            ["03:03:03:03:03:03", "01:01:01:01:01:01", "02:02:02:02:02:02"]
        );

        // An address that is not bonded leaves the order alone.
        let classifier = classifier.with_preferred(Some("09:09:09:09:09:09".into()));
        assert_eq!(
            addresses(classifier.list(&devices)),
            ["01:01:01:01:01:01", "02:02:02:02:02:02", "03:03:03:03:03:03"]
        );
    }

    #[test]
    fn failing_device_is_isolated() {
        let radio: Arc<dyn BluetoothRadio> = MockRadio::new();
        let broken: Arc<dyn RemoteDevice> = MockDevice::printer()
            .with_address("00:00:00:00:00:01")
            .failing_describe()
            .build();
        let office: Arc<dyn RemoteDevice> = MockDevice::new(Some("Office Printer 2"), DeviceClass::uncategorized())
            .with_address("00:00:00:00:00:02")
            .build();
        let router: Arc<dyn RemoteDevice> = MockDevice::new(
            Some("Router"),
            DeviceClass::new(DeviceClass::MAJOR_COMPUTER, 0x010C),
        )
        .with_address("00:00:00:00:00:03")
        .build();

        let found = PrinterClassifier::new(radio).list(&[broken, office, router]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].descriptor.address, "00:00:00:00:00:02");
    }

    #[tokio::test]
    async fn enumeration_failure_means_no_devices() {
        let classifier = PrinterClassifier::new(MockRadio::broken());
        assert!(classifier.list_bonded().await.is_empty());
        assert!(classifier.select_first().await.is_none());
    }

    #[tokio::test]
    async fn select_first_returns_connected_printer() {
        let phone: Arc<dyn RemoteDevice> = MockDevice::new(Some("My Phone"), DeviceClass::new(DeviceClass::MAJOR_PHONE, 0)).build();
        let printer: Arc<dyn RemoteDevice> = MockDevice::printer().with_address("22:22:22:22:22:22").build();
        let classifier = PrinterClassifier::new(MockRadio::with_devices(vec![phone, printer])).with_options(fast());

        let connector = classifier.select_first().await.expect("printer");
        let connector = connector.lock().await;
        assert!(connector.is_connected());
        assert_eq!(connector.device().map(|d| d.address()), Some("22:22:22:22:22:22"));
    }

    #[tokio::test]
    async fn select_first_prefers_configured_address() {
        let first: Arc<dyn RemoteDevice> = MockDevice::printer().with_address("01:01:01:01:01:01").build();
        let second: Arc<dyn RemoteDevice> = MockDevice::printer().with_address("02:02:02:02:02:02").build();
        let classifier = PrinterClassifier::new(MockRadio::with_devices(vec![first, second]))
            .with_options(fast())
            .with_preferred(Some("02:02:02:02:02:02".into()));

        let connector = classifier.select_first().await.expect("printer");
        assert_eq!(
            connector.lock().await.device().map(|d| d.address().to_owned()),
            Some("02:02:02:02:02:02".to_owned())
        );
    }

    #[tokio::test]
    async fn select_first_gives_up_when_connect_fails() {
        let dead = MockDevice::printer().secure_always(false).raw_script(&[], false).build();
        let listed: Arc<dyn RemoteDevice> = dead.clone();
        let classifier = PrinterClassifier::new(MockRadio::with_devices(vec![listed])).with_options(fast());

        assert!(classifier
            .select_first_with(1, Duration::from_secs(5))
            .await
            .is_none());
        assert_eq!(dead.raw_opens(), 2);
    }

    #[tokio::test]
    async fn select_first_with_no_printers_is_none() {
        let phone: Arc<dyn RemoteDevice> = MockDevice::new(Some("My Phone"), DeviceClass::new(DeviceClass::MAJOR_PHONE, 0)).build();
        let classifier = PrinterClassifier::new(MockRadio::with_devices(vec![phone]));
        assert!(classifier.select_first().await.is_none());
    }
}
