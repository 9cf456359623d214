//! Property listings and the room catalog derived from them
//!
//! A tour has four fixed rooms. Each room is available only when the listing
//! carries a photo for it; the catalog is rebuilt whenever the listing changes.

use crate::domain::types::{ImageId, PropertyId};
use serde::Serialize;
use std::str::FromStr;

/// A listed property with up to one photo per tour room
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    pub id: PropertyId,
    pub name: String,
    pub address: String,
    pub kitchen_image: Option<ImageId>,
    pub living_room_image: Option<ImageId>,
    pub bedroom_image: Option<ImageId>,
    pub bathroom_image: Option<ImageId>,
    /// Listing details quoted by the voice assistant, when the backend has them
    pub price: Option<String>,
    pub area: Option<String>,
    pub features: Vec<String>,
}

impl Property {
    pub fn new(id: &str, name: &str, address: &str) -> Self {
        Self {
            id: PropertyId(id.to_string()),
            name: name.to_string(),
            address: address.to_string(),
            kitchen_image: None,
            living_room_image: None,
            bedroom_image: None,
            bathroom_image: None,
            price: None,
            area: None,
            features: Vec::new(),
        }
    }

    /// Builder: attach a photo to a room
    pub fn with_image(mut self, room: RoomKind, image: &str) -> Self {
        *self.image_slot(room) = Some(ImageId::new(image));
        self
    }

    /// Builder: attach listing details
    pub fn with_details(mut self, price: &str, area: &str, features: &[&str]) -> Self {
        self.price = Some(price.to_string());
        self.area = Some(area.to_string());
        self.features = features.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn image_for(&self, room: RoomKind) -> Option<&ImageId> {
        match room {
            RoomKind::Kitchen => self.kitchen_image.as_ref(),
            RoomKind::LivingRoom => self.living_room_image.as_ref(),
            RoomKind::Bedroom => self.bedroom_image.as_ref(),
            RoomKind::Bathroom => self.bathroom_image.as_ref(),
        }
    }

    fn image_slot(&mut self, room: RoomKind) -> &mut Option<ImageId> {
        match room {
            RoomKind::Kitchen => &mut self.kitchen_image,
            RoomKind::LivingRoom => &mut self.living_room_image,
            RoomKind::Bedroom => &mut self.bedroom_image,
            RoomKind::Bathroom => &mut self.bathroom_image,
        }
    }
}

/// Tour room kinds, in catalog order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomKind {
    Kitchen,
    LivingRoom,
    Bedroom,
    Bathroom,
}

impl RoomKind {
    /// Fixed catalog order
    pub const ALL: [RoomKind; 4] =
        [RoomKind::Kitchen, RoomKind::LivingRoom, RoomKind::Bedroom, RoomKind::Bathroom];

    /// Room used when a listing has no photos at all
    pub const FALLBACK: RoomKind = RoomKind::Bedroom;

    pub fn as_str(&self) -> &'static str {
        match self {
            RoomKind::Kitchen => "kitchen",
            RoomKind::LivingRoom => "living_room",
            RoomKind::Bedroom => "bedroom",
            RoomKind::Bathroom => "bathroom",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RoomKind::Kitchen => "Kitchen",
            RoomKind::LivingRoom => "Living Room",
            RoomKind::Bedroom => "Bedroom",
            RoomKind::Bathroom => "Bathroom",
        }
    }

    /// Lower-case phrase for spoken replies ("living room")
    pub fn spoken(&self) -> &'static str {
        match self {
            RoomKind::LivingRoom => "living room",
            other => other.as_str(),
        }
    }

    /// Spoken description of the room
    pub fn description(&self) -> &'static str {
        match self {
            RoomKind::Kitchen => "This is a modern kitchen space. Look around to see the appliances, countertops, and overall layout.",
            RoomKind::LivingRoom => "This is the main living area where you can relax and entertain guests.",
            RoomKind::Bedroom => "This bedroom offers a comfortable sleeping space. Notice the lighting and room dimensions.",
            RoomKind::Bathroom => "This is the bathroom area. You can see the fixtures, vanity, and overall design.",
        }
    }
}

impl std::fmt::Display for RoomKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoomKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kitchen" => Ok(RoomKind::Kitchen),
            "living_room" | "living-room" | "living room" => Ok(RoomKind::LivingRoom),
            "bedroom" => Ok(RoomKind::Bedroom),
            "bathroom" => Ok(RoomKind::Bathroom),
            other => anyhow::bail!("unknown room id: {}", other),
        }
    }
}

/// A navigable room in the tour
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomDescriptor {
    pub kind: RoomKind,
    pub label: &'static str,
    pub image_id: Option<ImageId>,
    pub available: bool,
}

/// Ordered set of the four tour rooms for one property
#[derive(Debug, Clone, PartialEq)]
pub struct RoomCatalog {
    rooms: [RoomDescriptor; 4],
}

impl RoomCatalog {
    pub fn from_property(property: &Property) -> Self {
        let rooms = RoomKind::ALL.map(|kind| {
            let image_id = property.image_for(kind).cloned();
            RoomDescriptor { kind, label: kind.label(), available: image_id.is_some(), image_id }
        });
        Self { rooms }
    }

    pub fn rooms(&self) -> &[RoomDescriptor] {
        &self.rooms
    }

    pub fn get(&self, kind: RoomKind) -> &RoomDescriptor {
        // rooms are stored in RoomKind::ALL order
        &self.rooms[kind as usize]
    }

    pub fn available(&self) -> impl Iterator<Item = &RoomDescriptor> {
        self.rooms.iter().filter(|r| r.available)
    }

    pub fn has_available_rooms(&self) -> bool {
        self.available().next().is_some()
    }

    /// First available room in catalog order, or the bedroom when none are
    pub fn initial_room(&self) -> RoomKind {
        self.available().map(|r| r.kind).next().unwrap_or(RoomKind::FALLBACK)
    }
}

/// Built-in listings used when the listing backend is unreachable
pub fn sample_properties() -> Vec<Property> {
    vec![
        Property::new("1", "Modern Downtown Apartment", "Downtown District")
            .with_image(RoomKind::Bedroom, "689779a64956505c47af77fc")
            .with_image(RoomKind::Bathroom, "6897880d1da03bbe8093a959")
            .with_image(RoomKind::LivingRoom, "68978e04c4c955245f2c033e")
            .with_image(RoomKind::Kitchen, "689779a64956505c47af77fc"),
        Property::new("2", "Suburban Family Home", "Maple Heights")
            .with_image(RoomKind::Bedroom, "6897880d1da03bbe8093a959")
            .with_image(RoomKind::Kitchen, "68978e04c4c955245f2c033e"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_order_and_availability() {
        let property = Property::new("p", "P", "A")
            .with_image(RoomKind::Bedroom, "img-bed")
            .with_image(RoomKind::Bathroom, "img-bath");
        let catalog = RoomCatalog::from_property(&property);

        let kinds: Vec<RoomKind> = catalog.rooms().iter().map(|r| r.kind).collect();
        assert_eq!(kinds, RoomKind::ALL.to_vec());

        for room in catalog.rooms() {
            assert_eq!(room.available, room.image_id.is_some());
        }
        assert!(!catalog.get(RoomKind::Kitchen).available);
        assert_eq!(catalog.get(RoomKind::Bedroom).image_id, Some(ImageId::new("img-bed")));
    }

    #[test]
    fn test_initial_room_kitchen_only() {
        let property = Property::new("p", "P", "A").with_image(RoomKind::Kitchen, "k");
        let catalog = RoomCatalog::from_property(&property);
        assert_eq!(catalog.initial_room(), RoomKind::Kitchen);
    }

    #[test]
    fn test_initial_room_first_in_catalog_order() {
        let property = Property::new("p", "P", "A")
            .with_image(RoomKind::Bathroom, "b")
            .with_image(RoomKind::LivingRoom, "l");
        let catalog = RoomCatalog::from_property(&property);
        assert_eq!(catalog.initial_room(), RoomKind::LivingRoom);
    }

    #[test]
    fn test_no_rooms_falls_back_to_bedroom() {
        let catalog = RoomCatalog::from_property(&Property::new("p", "P", "A"));
        assert!(!catalog.has_available_rooms());
        assert_eq!(catalog.initial_room(), RoomKind::Bedroom);
        assert!(!catalog.get(RoomKind::Bedroom).available);
        assert_eq!(catalog.rooms().len(), 4);
    }

    #[test]
    fn test_room_kind_from_str() {
        assert_eq!("kitchen".parse::<RoomKind>().unwrap(), RoomKind::Kitchen);
        assert_eq!("living-room".parse::<RoomKind>().unwrap(), RoomKind::LivingRoom);
        assert_eq!("Living_Room".parse::<RoomKind>().unwrap(), RoomKind::LivingRoom);
        assert!("garage".parse::<RoomKind>().is_err());
    }

    #[test]
    fn test_sample_properties() {
        let samples = sample_properties();
        assert_eq!(samples.len(), 2);
        let family = RoomCatalog::from_property(&samples[1]);
        assert_eq!(family.available().count(), 2);
        assert_eq!(family.initial_room(), RoomKind::Kitchen);
    }
}
